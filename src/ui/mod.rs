//! Headless UI models
//!
//! Rendering lives in the host toolkit; these types hold the layout and
//! animation state it draws from.

mod animation;
pub mod tab_bar;

pub use animation::{Spring, SpringConfig, Timing};
pub use tab_bar::{
    Accessibility, Color, IconProps, Platform, TabBar, TabBarError, TabBarFrame, TabEvent,
    TabEventKind, TabItemFrame, TabNavigator, TabOptions, TabRoute,
};
