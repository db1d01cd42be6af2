pub mod answer;
pub mod question;
pub mod round;
pub mod score;
pub mod session;
pub mod timer;
pub mod view;

pub use answer::{AnswerStats, AnswerSubmission, ParticipantAnswer};
pub use question::{AnswerChoice, Question, QuestionSummary};
pub use round::{ActiveQuestionRecord, ReleasedWindow};
pub use score::{GradeReport, LeaderboardOrder, LeaderboardRow, ScoreEntry};
pub use session::SessionPaths;
pub use view::{ActiveQuestionView, ReadView, SessionStateView};
