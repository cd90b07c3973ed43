//! Fixed-function GL ES 1.1 front end for the pyrite driver
//!
//! [`GraphicsContext`] owns the entire driver: the shadowed API state, the
//! object table, the matrix engine and the push buffer. API calls mutate
//! shadowed state; a draw call runs the dispatcher, which compiles that
//! state into hardware commands (combiner programs for the texture
//! environment, register blocks for the lighting model) and submits them.

pub mod context;
pub mod draw;
pub mod lighting;
pub mod matrix;
pub mod objects;
pub mod state;
pub mod texenv;
pub mod texture;
pub mod types;

pub use context::GraphicsContext;
pub use matrix::{Mat4, MatrixEngine, MatrixStack};
pub use objects::{Handle, ObjectTable};
pub use state::GlState;
pub use types::*;
