pub mod avatar;
pub mod character_card;
pub mod config;
pub mod error;
pub mod http_client;
pub mod llm_client;
pub mod persona;
pub mod pipeline;
pub mod runtime;
pub mod sd_client;
pub mod server;
pub mod stages;

#[cfg(test)]
mod test_support;
