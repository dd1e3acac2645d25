pub mod audio_hardware;
pub mod sample_delegate;
