use crate::embedding::cosine_similarity;

/// What a chat message is asking for.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Intent {
    BookTicket,
    CollectInformation,
    BookingHelp,
    ContactSupport,
    Greeting,
}

impl Intent {
    /// Scan order; earlier intents win ties.
    pub const ALL: [Self; 5] = [
        Self::BookTicket,
        Self::CollectInformation,
        Self::BookingHelp,
        Self::ContactSupport,
        Self::Greeting,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BookTicket => "book_ticket",
            Self::CollectInformation => "collect_information",
            Self::BookingHelp => "booking_help",
            Self::ContactSupport => "contact_support",
            Self::Greeting => "greeting",
        }
    }

    /// Text whose embedding stands for the intent.
    pub const fn description(self) -> &'static str {
        match self {
            Self::BookTicket => {
                "Đặt vé xe khách, tìm chuyến xe phù hợp với yêu cầu của bạn"
            }
            Self::CollectInformation => {
                "Thu thập thông tin đặt vé: điểm đi, điểm đến, ngày và giờ \
                 khởi hành"
            }
            Self::BookingHelp => {
                "Hướng dẫn đặt vé, thanh toán và tra cứu thông tin vé"
            }
            Self::ContactSupport => {
                "Liên hệ bộ phận chăm sóc khách hàng khi gặp sự cố hoặc cần \
                 tư vấn"
            }
            Self::Greeting => "Chào hỏi và giới thiệu trợ lý đặt vé xe",
        }
    }

    /// Whether handling the intent reads and writes conversation state.
    pub const fn collects_slots(self) -> bool {
        matches!(self, Self::BookTicket | Self::CollectInformation)
    }
}

/// Picks the intent whose description is most similar to `message`.
///
/// `table` pairs every intent with its description embedding, in
/// [`Intent::ALL`] order. Only a strictly better score replaces the current
/// pick, starting from [`Intent::Greeting`] at -1; an empty `message`
/// embedding stays on [`Intent::Greeting`].
pub fn classify(message: &[f32], table: &[(Intent, Vec<f32>)]) -> Intent {
    if message.is_empty() {
        return Intent::Greeting;
    }
    let mut best = (Intent::Greeting, -1.0);
    for (intent, target) in table {
        let score = cosine_similarity(message, target);
        if score > best.1 {
            best = (*intent, score);
        }
    }
    best.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Vec<(Intent, Vec<f32>)> {
        vec![
            (Intent::BookTicket, vec![1.0, 0.0, 0.0]),
            (Intent::CollectInformation, vec![1.0, 0.0, 0.0]),
            (Intent::BookingHelp, vec![0.0, 1.0, 0.0]),
            (Intent::ContactSupport, vec![0.0, 0.0, 1.0]),
            (Intent::Greeting, vec![0.0, -1.0, 0.0]),
        ]
    }

    #[test]
    fn picks_most_similar_intent() {
        assert_eq!(classify(&[0.1, 0.9, 0.0], &table()), Intent::BookingHelp);
        assert_eq!(
            classify(&[0.0, 0.2, 0.8], &table()),
            Intent::ContactSupport,
        );
        assert_eq!(classify(&[0.0, -1.0, 0.0], &table()), Intent::Greeting);
    }

    #[test]
    fn earlier_intent_wins_tie() {
        assert_eq!(classify(&[1.0, 0.0, 0.0], &table()), Intent::BookTicket);
    }

    #[test]
    fn empty_embedding_is_greeting() {
        assert_eq!(classify(&[], &table()), Intent::Greeting);
        assert_eq!(classify(&[1.0, 0.0, 0.0], &[]), Intent::Greeting);
    }

    #[test]
    fn only_booking_intents_collect_slots() {
        let collecting: Vec<_> = Intent::ALL
            .into_iter()
            .filter(|i| i.collects_slots())
            .collect();
        assert_eq!(
            collecting,
            [Intent::BookTicket, Intent::CollectInformation],
        );
    }

    #[test]
    fn names_intents_in_snake_case() {
        let names = Intent::ALL.map(Intent::as_str);
        assert_eq!(
            names,
            [
                "book_ticket",
                "collect_information",
                "booking_help",
                "contact_support",
                "greeting",
            ],
        );
    }
}
