pub mod audio_backend;
pub mod audio_sink;
pub mod battle_observer;
pub mod game_client;
