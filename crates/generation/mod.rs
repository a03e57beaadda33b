pub mod suno_client;
