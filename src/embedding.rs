//! Sentence embeddings from a Hugging Face feature-extraction endpoint.

use derive_more::{Display, From};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::{Deserialize, Serialize};

use crate::config;

#[derive(Debug, Display, From)]
pub enum Error {
    #[display("embedding request failed: {_0}")]
    #[from]
    Request(reqwest_middleware::Error),

    #[display("embedding response unreadable: {_0}")]
    #[from]
    Response(reqwest::Error),

    #[display("embedding service answered with {_0}")]
    Status(reqwest::StatusCode),

    #[display("embedding response has no vector")]
    Empty,
}

/// Client of the feature-extraction endpoint. Vectors it returns are
/// mean-pooled over tokens when needed and L2-normalized.
#[derive(Clone)]
pub struct Client {
    http: ClientWithMiddleware,
    config: config::Embedding,
}

#[derive(Serialize)]
struct Request<'a, T: ?Sized> {
    inputs: &'a T,
}

/// Either a ready sentence vector or one vector per token.
#[derive(Deserialize)]
#[serde(untagged)]
enum Output {
    Sentence(Vec<f32>),
    Tokens(Vec<Vec<f32>>),
}

impl Output {
    fn into_vector(self) -> Result<Vec<f32>, Error> {
        let vector = match self {
            Self::Sentence(v) => v,
            Self::Tokens(tokens) => mean_pool(&tokens),
        };
        if vector.is_empty() {
            return Err(Error::Empty);
        }
        Ok(normalize(vector))
    }
}

impl Client {
    pub fn new(config: config::Embedding) -> Self {
        let retry_policy = ExponentialBackoff::builder()
            .build_with_max_retries(config.max_retries);
        let http = ClientBuilder::new(reqwest::Client::new())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();
        Self { http, config }
    }

    /// Embeds one text. Blank text embeds to an empty vector without a
    /// request.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, Error> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        self.request::<str, Output>(text).await?.into_vector()
    }

    /// Embeds several texts at once, in order. Blank texts are skipped.
    pub async fn embed_batch(
        &self,
        texts: &[&str],
    ) -> Result<Vec<Vec<f32>>, Error> {
        let inputs = texts
            .iter()
            .copied()
            .filter(|t| !t.trim().is_empty())
            .collect::<Vec<_>>();
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        self.request::<[&str], Vec<Output>>(&inputs)
            .await?
            .into_iter()
            .map(Output::into_vector)
            .collect()
    }

    async fn request<I, O>(&self, inputs: &I) -> Result<O, Error>
    where
        I: Serialize + ?Sized,
        O: for<'de> Deserialize<'de>,
    {
        let response = self
            .http
            .post(&self.config.url)
            .bearer_auth(&self.config.token)
            .header("Accept", "application/json")
            .json(&Request { inputs })
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::Status(response.status()));
        }
        Ok(response.json::<O>().await?)
    }
}

/// Averages token vectors dimension-wise. Short rows count as zeros.
pub fn mean_pool(tokens: &[Vec<f32>]) -> Vec<f32> {
    let Some(dim) = tokens.first().map(Vec::len) else {
        return Vec::new();
    };
    let mut sums = vec![0.0; dim];
    for token in tokens {
        for (sum, v) in sums.iter_mut().zip(token) {
            *sum += v;
        }
    }
    let count = tokens.len() as f32;
    sums.iter_mut().for_each(|s| *s /= count);
    sums
}

/// Scales `vector` to unit length. A zero vector is returned as is.
pub fn normalize(mut vector: Vec<f32>) -> Vec<f32> {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.iter_mut().for_each(|v| *v /= norm);
    }
    vector
}

/// Cosine of the angle between `a` and `b`, over their common prefix.
/// Zero-length inputs score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut norm_a, mut norm_b) = (0.0, 0.0, 0.0);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return dot;
    }
    dot / denom
}
