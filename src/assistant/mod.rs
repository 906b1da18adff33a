//! Chat assistant that guides a traveller towards a booking.
//!
//! Every message is classified by embedding similarity. Booking intents fill
//! the traveller's [`ConversationState`] across turns from slots an LLM
//! extracts; once departure, arrival and date are known, the stations are
//! resolved by embedding similarity and matching departures are offered.

pub mod intent;
pub mod slots;

use async_trait::async_trait;
use itertools::Itertools as _;
use serde_json::json;
use time::OffsetDateTime;
use tokio::sync::OnceCell;

use crate::{
    api::chatbot::Reply,
    db::{
        self,
        chatbot::{ConversationState, HistoryEntry, Pending, Slots},
        schedule::{Offer, Search},
        station, user, Station,
    },
    embedding, llm,
};

pub use self::intent::Intent;

/// Stations scoring at or below this are not considered a match.
pub const STATION_SIMILARITY_THRESHOLD: f32 = 0.7;

/// Departures offered at most per search.
pub const SEARCH_LIMIT: usize = 10;

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, embedding::Error>;

    async fn embed_batch(
        &self,
        texts: &[&str],
    ) -> Result<Vec<Vec<f32>>, embedding::Error>;
}

#[async_trait]
impl Embedder for embedding::Client {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, embedding::Error> {
        embedding::Client::embed(self, text).await
    }

    async fn embed_batch(
        &self,
        texts: &[&str],
    ) -> Result<Vec<Vec<f32>>, embedding::Error> {
        embedding::Client::embed_batch(self, texts).await
    }
}

#[async_trait]
pub trait Completer: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, llm::Error>;
}

#[async_trait]
impl Completer for llm::Client {
    async fn complete(&self, prompt: &str) -> Result<String, llm::Error> {
        llm::Client::complete(self, prompt).await
    }
}

/// Persistence the assistant reads and writes.
#[async_trait]
pub trait Store: Send + Sync {
    async fn conversation_state(
        &self,
        user_id: user::Id,
    ) -> Result<Option<ConversationState>, db::Error>;

    async fn save_conversation_state(
        &self,
        user_id: user::Id,
        state: &ConversationState,
    ) -> Result<(), db::Error>;

    async fn clear_conversation_state(
        &self,
        user_id: user::Id,
    ) -> Result<(), db::Error>;

    async fn save_history(
        &self,
        entry: &HistoryEntry<'_>,
    ) -> Result<(), db::Error>;

    async fn embedded_stations(&self) -> Result<Vec<Station>, db::Error>;

    async fn search_departures(
        &self,
        search: Search,
    ) -> Result<Vec<Offer>, db::Error>;
}

#[async_trait]
impl Store for db::Client {
    async fn conversation_state(
        &self,
        user_id: user::Id,
    ) -> Result<Option<ConversationState>, db::Error> {
        self.get_conversation_state(user_id).await
    }

    async fn save_conversation_state(
        &self,
        user_id: user::Id,
        state: &ConversationState,
    ) -> Result<(), db::Error> {
        db::Client::save_conversation_state(self, user_id, state).await
    }

    async fn clear_conversation_state(
        &self,
        user_id: user::Id,
    ) -> Result<(), db::Error> {
        db::Client::clear_conversation_state(self, user_id).await
    }

    async fn save_history(
        &self,
        entry: &HistoryEntry<'_>,
    ) -> Result<(), db::Error> {
        db::Client::save_history(self, entry).await
    }

    async fn embedded_stations(&self) -> Result<Vec<Station>, db::Error> {
        self.get_embedded_stations().await
    }

    async fn search_departures(
        &self,
        search: Search,
    ) -> Result<Vec<Offer>, db::Error> {
        db::Client::search_departures(self, search).await
    }
}

pub struct Assistant<E, C> {
    embedder: E,
    completer: C,
    intents: OnceCell<Vec<(Intent, Vec<f32>)>>,
}

impl<E: Embedder, C: Completer> Assistant<E, C> {
    pub fn new(embedder: E, completer: C) -> Self {
        Self {
            embedder,
            completer,
            intents: OnceCell::new(),
        }
    }

    /// Answers one message. `user_id` is [`None`] for anonymous travellers,
    /// who may chat but not book.
    ///
    /// Embedding and LLM outages degrade the answer and are never returned;
    /// only `store` failures are.
    pub async fn reply<S: Store>(
        &self,
        store: &S,
        message: &str,
        user_id: Option<user::Id>,
    ) -> Result<Reply, db::Error> {
        let embedding = self
            .embedder
            .embed(message)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!("failed to embed message: {e}");
                Vec::new()
            });
        let intent = match self.intent_table().await {
            Ok(table) => intent::classify(&embedding, table),
            Err(e) => {
                tracing::warn!("failed to embed intent descriptions: {e}");
                Intent::Greeting
            }
        };

        let (reply, data) = match (intent, user_id) {
            (_, None) if intent.collects_slots() => (
                "Bạn cần đăng nhập để đặt vé. Hãy đăng nhập rồi thử lại nhé."
                    .to_owned(),
                json!({ "intent": intent.as_str(), "requiresLogin": true }),
            ),
            (_, Some(user_id)) if intent.collects_slots() => {
                self.collect(store, intent, message, user_id).await?
            }
            (Intent::BookingHelp, _) => (
                "Đặt vé gồm bốn bước:\n\
                 1. Chọn tuyến và chuyến xe\n\
                 2. Chọn ghế\n\
                 3. Thanh toán chuyển khoản hoặc tiền mặt\n\
                 4. Nhận vé trong mục \"Vé của tôi\"\n\
                 Bạn đang vướng ở bước nào?"
                    .to_owned(),
                json!({ "intent": intent.as_str() }),
            ),
            (Intent::ContactSupport, _) => (
                "Bạn có thể liên hệ bộ phận hỗ trợ:\n\
                 Hotline: 1900 0152\n\
                 Email: support@datxekhach.com\n\
                 Hoặc để lại lời nhắn, chúng tôi sẽ chuyển đến nhân viên hỗ trợ."
                    .to_owned(),
                json!({ "intent": intent.as_str() }),
            ),
            _ => (
                "Xin chào! Tôi là trợ lý đặt vé xe khách. Tôi có thể tìm chuyến \
                 xe theo tuyến và ngày, kiểm tra ghế trống và giải đáp thắc mắc \
                 về dịch vụ. Bạn cần gì?"
                    .to_owned(),
                json!({ "intent": intent.as_str() }),
            ),
        };

        let history = HistoryEntry {
            user_id,
            intent: intent.as_str(),
            message,
            response: &reply,
            embedding: &embedding,
        };
        if let Err(e) = store.save_history(&history).await {
            tracing::warn!("failed to save chatbot history: {e}");
        }

        Ok(Reply {
            intent: intent.as_str().to_owned(),
            reply,
            data: Some(data),
        })
    }

    /// Description embeddings of every intent, computed on first use. A
    /// failed computation is retried by the next caller.
    async fn intent_table(
        &self,
    ) -> Result<&[(Intent, Vec<f32>)], embedding::Error> {
        self.intents
            .get_or_try_init(|| async {
                let descriptions = Intent::ALL.map(Intent::description);
                let vectors = self.embedder.embed_batch(&descriptions).await?;
                if vectors.len() != Intent::ALL.len() {
                    return Err(embedding::Error::Empty);
                }
                Ok(Intent::ALL.into_iter().zip(vectors).collect())
            })
            .await
            .map(Vec::as_slice)
    }

    /// Merges this message's slots into the traveller's state and, once the
    /// required slots are known, hands off to departure search.
    async fn collect<S: Store>(
        &self,
        store: &S,
        intent: Intent,
        message: &str,
        user_id: user::Id,
    ) -> Result<(String, serde_json::Value), db::Error> {
        let previous = store
            .conversation_state(user_id)
            .await?
            .unwrap_or_default();
        let extracted = self.extract(message).await;
        let collected = slots::fuse(previous.collected, extracted);
        let missing = slots::missing(&collected);

        let state = ConversationState {
            collected,
            pending: Pending {
                missing_fields: missing.clone(),
            },
        };
        store.save_conversation_state(user_id, &state).await?;

        if !missing.is_empty() {
            let labels = missing.iter().copied().map(slots::label).join(", ");
            let reply = match intent {
                Intent::CollectInformation => format!(
                    "Tôi đã ghi nhận thông tin của bạn. Còn thiếu: {labels}. \
                     Bạn bổ sung giúp tôi nhé."
                ),
                _ => format!(
                    "Để đặt vé, tôi cần thêm {labels}. Bạn cho tôi biết \
                     thêm nhé."
                ),
            };
            return Ok((
                reply,
                json!({
                    "intent": intent.as_str(),
                    "collected": state.collected,
                    "missing_fields": missing,
                }),
            ));
        }

        self.hand_off(store, intent, user_id, &state.collected).await
    }

    async fn extract(&self, message: &str) -> Slots {
        let today = OffsetDateTime::now_utc().date();
        match self
            .completer
            .complete(&slots::extraction_prompt(message, today))
            .await
        {
            Ok(reply) => slots::parse_extraction(&reply),
            Err(e) => {
                tracing::warn!("failed to extract booking slots: {e}");
                Slots::default()
            }
        }
    }

    /// Searches departures for fully collected slots. The state is cleared
    /// only when something is found, so the traveller can adjust and retry.
    async fn hand_off<S: Store>(
        &self,
        store: &S,
        intent: Intent,
        user_id: user::Id,
        collected: &Slots,
    ) -> Result<(String, serde_json::Value), db::Error> {
        let offers = self.find_departures(store, collected).await?;

        let Some((search, offers)) = offers.filter(|(_, o)| !o.is_empty())
        else {
            return Ok((
                "Rất tiếc, tôi chưa tìm thấy chuyến xe nào phù hợp. Bạn thử \
                 đổi ngày hoặc tuyến đường khác nhé."
                    .to_owned(),
                json!({
                    "intent": intent.as_str(),
                    "noResults": true,
                    "collected": collected,
                }),
            ));
        };

        store.clear_conversation_state(user_id).await?;
        tracing::info!(
            user_id = %user_id,
            found = offers.len(),
            "assistant handed off to departure search",
        );

        Ok((
            format!(
                "Tôi đã tìm thấy {} chuyến xe phù hợp với yêu cầu của bạn.",
                offers.len(),
            ),
            json!({
                "intent": intent.as_str(),
                "schedules": offers,
                "redirect_url": format!(
                    "bus-list?departure={}&destination={}&departureDate={}",
                    search.departure_station_id,
                    search.arrival_station_id,
                    search.date,
                ),
            }),
        ))
    }

    /// Departures matching `collected`, or [`None`] if its stations or date
    /// cannot be resolved.
    async fn find_departures<S: Store>(
        &self,
        store: &S,
        collected: &Slots,
    ) -> Result<Option<(Search, Vec<Offer>)>, db::Error> {
        let (Some(departure), Some(arrival), Some(date)) = (
            collected.departure_station.as_deref(),
            collected.arrival_station.as_deref(),
            collected.departure_date.as_deref().and_then(slots::parse_date),
        ) else {
            return Ok(None);
        };

        let stations = store.embedded_stations().await?;
        let (departure, arrival) = futures::join!(
            self.resolve_station(&stations, departure),
            self.resolve_station(&stations, arrival),
        );
        let (Some(departure_station_id), Some(arrival_station_id)) =
            (departure, arrival)
        else {
            return Ok(None);
        };

        let search = Search {
            departure_station_id,
            arrival_station_id,
            date,
            limit: SEARCH_LIMIT,
        };
        let offers = store.search_departures(search).await?;
        Ok(Some((search, offers)))
    }

    /// Station whose embedding is most similar to `name`, provided the
    /// similarity exceeds [`STATION_SIMILARITY_THRESHOLD`].
    async fn resolve_station(
        &self,
        stations: &[Station],
        name: &str,
    ) -> Option<station::Id> {
        let embedding = self
            .embedder
            .embed(name)
            .await
            .map_err(|e| tracing::warn!("failed to embed station name: {e}"))
            .ok()?;
        best_station(&embedding, stations)
    }
}

/// Most similar station strictly above the threshold; the first one wins ties.
pub fn best_station(name: &[f32], stations: &[Station]) -> Option<station::Id> {
    if name.is_empty() {
        return None;
    }
    let mut best = None;
    let mut best_score = STATION_SIMILARITY_THRESHOLD;
    for station in stations {
        let Some(embedding) =
            station.embedding.as_deref().filter(|e| !e.is_empty())
        else {
            continue;
        };
        let score = embedding::cosine_similarity(name, embedding);
        if score > best_score {
            best = Some(station.id);
            best_score = score;
        }
    }
    best
}
