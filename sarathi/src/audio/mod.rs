//! Audio pipeline: record a take, then upload it in one piece.

mod capture;
mod command_mic;
mod transfer;

pub use capture::{AudioBuffer, AudioCapture, MicrophoneSession, MicrophoneSource};
pub use command_mic::CommandMicrophone;
pub use transfer::{AudioTransfer, TransferHandle, TransferOutcome};
