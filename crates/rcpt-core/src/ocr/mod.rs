//! OCR stage: image preprocessing and the engine lifecycle adapter.

mod adapter;
mod engine;
mod preprocessing;
#[cfg(feature = "native")]
mod pure_engine;

pub use adapter::{EngineStatus, OcrAdapter};
pub use engine::{EngineLoader, RecognitionEngine};
pub use preprocessing::{ImagePreprocessor, PreparedImage};

#[cfg(feature = "native")]
pub use pure_engine::{PureOcrEngine, PureOcrLoader};

#[cfg(test)]
pub(crate) use adapter::tests::FakeLoader;
