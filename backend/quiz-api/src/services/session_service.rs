use std::sync::Arc;

use serde_json::Value;

use crate::error::QuizError;
use crate::models::{ActiveQuestionRecord, ActiveQuestionView, SessionPaths, SessionStateView};
use crate::store::{SessionStore, StoreError};
use crate::utils::time::now_millis;

pub struct SessionService {
    store: Arc<dyn SessionStore>,
    paths: SessionPaths,
}

impl SessionService {
    pub fn new(store: Arc<dyn SessionStore>, paths: SessionPaths) -> Self {
        Self { store, paths }
    }

    pub async fn active_question(&self) -> Result<Option<ActiveQuestionRecord>, QuizError> {
        read_active_question(self.store.as_ref(), &self.paths).await
    }

    /// What every client renders: the active question with its local countdown, and
    /// whether the leaderboard is shown.
    pub async fn session_state(&self) -> Result<SessionStateView, QuizError> {
        let (current, show_leaderboard) = futures::try_join!(
            self.active_question(),
            self.read_show_leaderboard()
        )?;

        let now = now_millis();
        Ok(SessionStateView {
            current_question: current.map(|record| ActiveQuestionView::at(record, now)),
            show_leaderboard,
        })
    }

    async fn read_show_leaderboard(&self) -> Result<bool, QuizError> {
        let value = self.store.read(&self.paths.show_leaderboard()).await?;
        Ok(matches!(value, Some(Value::Bool(true))))
    }
}

pub(crate) async fn read_active_question(
    store: &dyn SessionStore,
    paths: &SessionPaths,
) -> Result<Option<ActiveQuestionRecord>, QuizError> {
    let path = paths.current_question();
    match store.read(&path).await? {
        Some(value) => serde_json::from_value(value).map(Some).map_err(|e| {
            QuizError::from(StoreError::Malformed {
                path: path.to_string(),
                message: e.to_string(),
            })
        }),
        None => Ok(None),
    }
}
