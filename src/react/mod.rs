//! 认知层：工具调用主循环、答案校验、流式事件与分片输出

pub mod events;
pub mod loop_;
pub mod stream;
pub mod validator;

pub use events::{EventSink, StreamEvent};
pub use loop_::{chat_loop, ChatOutcome, ChatSession, DEFAULT_MAX_ITERATIONS, FINAL_ANSWER_PROMPT};
pub use stream::{chunk_answer, chunk_size_for, stream_answer};
pub use validator::{AnswerValidator, Verdict, FORBIDDEN_PHRASES};
