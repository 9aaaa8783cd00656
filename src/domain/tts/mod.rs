pub mod chunks;
pub mod dto;
pub mod error;
pub mod service;

pub use chunks::{chunk_file_name, chunk_output_path, read_chunks_file};
pub use dto::{
    BackendErrorPayload, SamplingParams, SynthesisRequest, DEFAULT_LANGUAGE, DEFAULT_TEMPERATURE,
};
pub use error::{BatchFailure, ChunkFailure, ChunkProcessorError, SynthesisError};
pub use service::{ChunkProcessor, ChunkProcessorApi, ProcessorSettings, HEALTH_CHECK_TIMEOUT};
