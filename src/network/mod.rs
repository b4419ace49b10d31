pub mod checkpoint;
pub mod sequential;
pub mod spec;

pub use checkpoint::Checkpoint;
pub use sequential::Sequential;
pub use spec::{LayerSpec, NetworkSpec};
