pub mod driver;
pub mod machine;
pub mod session;

pub use driver::execute;
pub use machine::{Effect, Event};
pub use session::{OriginalImage, Session, Step, MAX_APPROVED};
