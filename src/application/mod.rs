pub mod use_cases;

pub use use_cases::epic_context::{EpicContext, EpicContextUseCase};
pub use use_cases::test_generation::{GenerationReport, TestGenerationUseCase};
