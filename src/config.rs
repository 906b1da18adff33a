use std::{net, time};

use serde::Deserialize;

#[derive(Deserialize)]
pub struct Config {
    pub db: Db,
    pub http: Http,
    pub jwt: Jwt,
    pub embedding: Embedding,
    pub llm: Llm,
}

#[derive(Deserialize)]
pub struct Db {
    pub url: String,
}

#[derive(Deserialize)]
pub struct Http {
    pub server: Server,
    pub cors: Cors,
}

#[derive(Deserialize)]
pub struct Server {
    pub addr: net::SocketAddr,
}

#[derive(Deserialize)]
pub struct Cors {
    pub allowed_origins: Vec<String>,
}

#[derive(Deserialize)]
pub struct Jwt {
    pub secret: String,
    #[serde(with = "humantime_serde")]
    pub expiration_time: time::Duration,
}

/// Feature-extraction endpoint producing sentence embeddings.
#[derive(Clone, Deserialize)]
pub struct Embedding {
    pub url: String,
    pub token: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

/// OpenAI-compatible chat completions endpoint.
#[derive(Clone, Deserialize)]
pub struct Llm {
    pub url: String,
    pub token: String,
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_max_retries() -> u32 {
    1
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_temperature() -> f32 {
    0.7
}
