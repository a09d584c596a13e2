//! Presentation layer - display-ready read models, one tick behind

pub mod view;

pub use view::{Presenter, ViewModel};
