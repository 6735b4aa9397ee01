mod block;
mod ids;
mod media;
mod rating;
mod round;
mod session;
mod template;
mod unit;

pub use ids::{BlockCode, ParseIdError, RoundId};

pub use block::{Block, BlockKind};
pub use media::{MediaLink, MediaLinkError};
pub use rating::{QualityRating, RatingError};
pub use round::{Round, RoundDraft};
pub use session::{SessionFeedback, SessionSummary, SessionTally, SummaryError};
pub use template::{SessionTemplate, Step, TemplateDraft, TemplateError};
pub use unit::{PlaybackUnit, UnitOrigin, UnitRecord, UnitStatus};
