use crate::record::{Action, ShapeId};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FormError {
    #[error("no shape is selected")]
    NoShapeSelected,
    #[error("tree count is required")]
    MissingCount,
    #[error("tree count must be a whole number of 0 or more")]
    InvalidCount,
    #[error("choose planting or cutting")]
    MissingAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormState {
    Idle,
    Editing { shape: ShapeId },
}

/// Values committed by a successful submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submission {
    pub shape: ShapeId,
    pub count: u32,
    pub action: Action,
}

/// Count/action inputs bound to the shape that was drawn last.
#[derive(Debug, Clone)]
pub struct AnnotationForm {
    state: FormState,
    /// Raw text of the count input, so an empty field can be told apart from 0.
    pub count: String,
    pub action: Action,
}

impl Default for AnnotationForm {
    fn default() -> Self {
        Self {
            state: FormState::Idle,
            count: "0".to_owned(),
            action: Action::Unset,
        }
    }
}

impl AnnotationForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_shape(&self) -> Option<ShapeId> {
        match self.state {
            FormState::Idle => None,
            FormState::Editing { shape } => Some(shape),
        }
    }

    pub fn is_editing(&self) -> bool {
        self.current_shape().is_some()
    }

    /// Targets `shape` with fresh inputs. A pending selection is replaced.
    pub fn begin(&mut self, shape: ShapeId) {
        self.reset_inputs();
        self.state = FormState::Editing { shape };
    }

    /// Drops the selection without committing anything.
    pub fn reset(&mut self) {
        self.reset_inputs();
        self.state = FormState::Idle;
    }

    fn reset_inputs(&mut self) {
        self.count = "0".to_owned();
        self.action = Action::Unset;
    }

    /// Strips everything but ASCII digits from the count input.
    pub fn keep_count_digits(&mut self) {
        self.count.retain(|c| c.is_ascii_digit());
    }

    fn parse_count(&self) -> Result<u32, FormError> {
        let raw = self.count.trim();
        if raw.is_empty() {
            return Err(FormError::MissingCount);
        }
        raw.parse::<u32>().map_err(|_| FormError::InvalidCount)
    }

    /// Checks the inputs without changing state.
    pub fn validate(&self) -> Result<Submission, FormError> {
        let shape = self.current_shape().ok_or(FormError::NoShapeSelected)?;
        let count = self.parse_count()?;
        if !self.action.is_set() {
            return Err(FormError::MissingAction);
        }
        Ok(Submission {
            shape,
            count,
            action: self.action,
        })
    }

    /// Commits the inputs and returns to idle. On error nothing changes.
    pub fn submit(&mut self) -> Result<Submission, FormError> {
        let submission = self.validate()?;
        self.reset_inputs();
        self.state = FormState::Idle;
        Ok(submission)
    }
}
