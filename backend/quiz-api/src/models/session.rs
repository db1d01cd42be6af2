use crate::store::{StoreError, StorePath};

/// Store layout of one quiz session, rooted at `sessions/{sessionId}`.
#[derive(Debug, Clone)]
pub struct SessionPaths {
    session_id: String,
    root: StorePath,
}

impl SessionPaths {
    pub fn new(session_id: &str) -> Result<Self, StoreError> {
        let root = StorePath::root().join("sessions").child(session_id)?;
        Ok(Self {
            session_id: session_id.to_string(),
            root,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn root(&self) -> &StorePath {
        &self.root
    }

    pub fn questions(&self) -> StorePath {
        self.root.join("questions")
    }

    pub fn question(&self, question_id: &str) -> Result<StorePath, StoreError> {
        self.questions().child(question_id)
    }

    fn state(&self) -> StorePath {
        self.root.join("state")
    }

    pub fn current_question(&self) -> StorePath {
        self.state().join("currentQuestion")
    }

    pub fn answer_revealed(&self) -> StorePath {
        self.current_question().join("answerRevealed")
    }

    pub fn released(&self, question_id: &str) -> Result<StorePath, StoreError> {
        self.state().join("released").child(question_id)
    }

    pub fn show_leaderboard(&self) -> StorePath {
        self.state().join("showLeaderboard")
    }

    pub fn scores(&self) -> StorePath {
        self.state().join("score")
    }

    pub fn score(&self, participant_id: &str, question_id: &str) -> Result<StorePath, StoreError> {
        self.scores().child(participant_id)?.child(question_id)
    }

    pub fn answers(&self, question_id: &str) -> Result<StorePath, StoreError> {
        self.root.join("answers").child(question_id)
    }

    pub fn answer(&self, question_id: &str, participant_id: &str) -> Result<StorePath, StoreError> {
        self.answers(question_id)?.child(participant_id)
    }
}
