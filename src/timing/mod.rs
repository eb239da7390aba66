mod clock;
mod scheduler;
mod sequence;
mod timeline;

pub use clock::{CancelToken, Clock, SystemClock, VirtualClock, Wake};
pub use scheduler::{DEFAULT_RETRY_DELAY, Plan, PlaybackReport, Scheduler};
pub use sequence::{DEFAULT_VELOCITY, GeneratedPattern, Note, Sequence, StaticPattern, Tempo};
pub use timeline::Timeline;
