pub mod cancel;
pub mod classifier;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod gateway;
pub mod imaging;
mod journal;
pub mod pipeline;
pub mod session;

#[cfg(test)]
mod testing;

pub use cancel::CancelToken;
pub use config::EngineConfig;
pub use dispatcher::{resolve_target_image, DispatchPolicy, TurnRequest};
pub use error::{GatewayError, StudioError};
pub use gateway::{AudioClip, DryrunGateway, GeminiGateway, ImageTier, ModelGateway};
pub use session::{Session, Studio};
