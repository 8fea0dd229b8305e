//! Animated bottom tab bar
//!
//! A highlight blob slides under the focused tab while each item scales
//! up and fades in when focused. The host calls [`TabBar::tick`] every
//! frame and draws [`TabBar::frame`].

use std::time::Duration;

use thiserror::Error;

use super::animation::{Spring, SpringConfig, Timing};

const BLOB_SPRING: SpringConfig = SpringConfig::new(20.0, 90.0);
const BLOB_OFFSET_SPRING: SpringConfig = SpringConfig::new(15.0, 80.0);
const ITEM_SCALE_SPRING: SpringConfig = SpringConfig::new(15.0, 150.0);
const ITEM_FADE: Duration = Duration::from_millis(200);

const FOCUSED_SCALE: f64 = 1.15;
const RESTING_SCALE: f64 = 1.0;
const FOCUSED_OPACITY: f64 = 1.0;
const RESTING_OPACITY: f64 = 0.6;

pub const ICON_SIZE: u32 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const PRIMARY: Color = Color::rgb(0xFE, 0x2C, 0x55);
    pub const BLACK: Color = Color::rgb(0x00, 0x00, 0x00);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// `#RRGGBB`
    pub fn hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Platform {
    Web,
    #[default]
    Ios,
    Android,
}

impl Platform {
    /// Width in points the blob offset is laid out against
    pub fn layout_width(&self) -> f64 {
        match self {
            Platform::Web => 400.0,
            Platform::Ios | Platform::Android => 375.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TabOptions {
    pub accessibility_label: Option<String>,
    pub test_id: Option<String>,
    /// Icon name; tabs without one render no icon
    pub icon: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TabRoute {
    pub key: String,
    pub name: String,
    pub options: TabOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabEventKind {
    TabPress,
    TabLongPress,
}

impl TabEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TabEventKind::TabPress => "tabPress",
            TabEventKind::TabLongPress => "tabLongPress",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TabEvent {
    pub kind: TabEventKind,
    /// Key of the pressed route
    pub target: String,
    pub can_prevent_default: bool,
}

/// Navigation container the tab bar reports to
#[cfg_attr(test, mockall::automock)]
pub trait TabNavigator {
    /// Deliver an event; returns whether a listener prevented the default
    fn emit(&mut self, event: &TabEvent) -> bool;

    fn navigate(&mut self, route_name: &str);
}

#[derive(Debug, Error, PartialEq)]
pub enum TabBarError {
    #[error("Tab bar needs at least one route")]
    NoRoutes,

    #[error("Tab index {index} out of range for {len} routes")]
    IndexOutOfRange { index: usize, len: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct IconProps {
    pub name: String,
    pub size: u32,
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Accessibility {
    pub role: &'static str,
    pub selected: bool,
    pub label: Option<String>,
    pub test_id: Option<String>,
}

/// Everything needed to draw one tab
#[derive(Debug, Clone, PartialEq)]
pub struct TabItemFrame {
    pub key: String,
    pub focused: bool,
    pub scale: f64,
    pub opacity: f64,
    pub icon: Option<IconProps>,
    pub accessibility: Accessibility,
}

/// Everything needed to draw the bar
#[derive(Debug, Clone, PartialEq)]
pub struct TabBarFrame {
    /// Tab width in percent of the bar
    pub tab_width: f64,
    /// Horizontal blob offset in points
    pub blob_offset: f64,
    pub items: Vec<TabItemFrame>,
}

#[derive(Debug, Clone)]
struct TabItem {
    scale: Spring,
    opacity: Timing,
}

impl TabItem {
    fn new(focused: bool) -> Self {
        let mut scale = Spring::new(RESTING_SCALE, ITEM_SCALE_SPRING);
        scale.set_target(if focused { FOCUSED_SCALE } else { RESTING_SCALE });
        let opacity = Timing::new(
            if focused { FOCUSED_OPACITY } else { RESTING_OPACITY },
            ITEM_FADE,
        );
        Self { scale, opacity }
    }

    fn set_focused(&mut self, focused: bool) {
        self.scale
            .set_target(if focused { FOCUSED_SCALE } else { RESTING_SCALE });
        self.opacity
            .set_target(if focused { FOCUSED_OPACITY } else { RESTING_OPACITY });
    }
}

#[derive(Debug, Clone)]
pub struct TabBar {
    routes: Vec<TabRoute>,
    index: usize,
    platform: Platform,
    /// Blob position in percent of the bar
    blob: Spring,
    /// Blob position in points, chasing `blob`
    blob_offset: Spring,
    items: Vec<TabItem>,
}

impl TabBar {
    /// The blob starts at the left edge and slides to `index`
    pub fn new(routes: Vec<TabRoute>, index: usize, platform: Platform) -> Result<Self, TabBarError> {
        check_index(index, routes.len())?;

        let items = (0..routes.len()).map(|i| TabItem::new(i == index)).collect();
        let mut bar = Self {
            routes,
            index,
            platform,
            blob: Spring::new(0.0, BLOB_SPRING),
            blob_offset: Spring::new(0.0, BLOB_OFFSET_SPRING),
            items,
        };
        bar.blob.set_target(bar.blob_target());
        Ok(bar)
    }

    pub fn routes(&self) -> &[TabRoute] {
        &self.routes
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Width of one tab in percent of the bar
    pub fn tab_width(&self) -> f64 {
        100.0 / self.routes.len() as f64
    }

    /// Follow a focus change made by the navigator
    pub fn set_index(&mut self, index: usize) -> Result<(), TabBarError> {
        check_index(index, self.routes.len())?;
        if index == self.index {
            return Ok(());
        }

        self.items[self.index].set_focused(false);
        self.items[index].set_focused(true);
        self.index = index;
        self.blob.set_target(self.blob_target());
        Ok(())
    }

    /// Advance every animation by `dt`
    pub fn tick(&mut self, dt: Duration) {
        self.blob.step(dt);
        self.blob_offset
            .set_target(self.blob.value() / 100.0 * self.platform.layout_width());
        self.blob_offset.step(dt);

        for item in self.items.iter_mut() {
            item.scale.step(dt);
            item.opacity.step(dt);
        }
    }

    pub fn is_settled(&self) -> bool {
        self.blob.is_settled()
            && self.blob_offset.is_settled()
            && self
                .items
                .iter()
                .all(|item| item.scale.is_settled() && item.opacity.is_settled())
    }

    pub fn frame(&self) -> TabBarFrame {
        let items = self
            .routes
            .iter()
            .zip(&self.items)
            .enumerate()
            .map(|(i, (route, item))| {
                let focused = i == self.index;
                let color = if focused { Color::PRIMARY } else { Color::BLACK };
                TabItemFrame {
                    key: route.key.clone(),
                    focused,
                    scale: item.scale.value(),
                    opacity: item.opacity.value(),
                    icon: route.options.icon.as_ref().map(|name| IconProps {
                        name: name.clone(),
                        size: ICON_SIZE,
                        color,
                    }),
                    accessibility: Accessibility {
                        role: "button",
                        selected: focused,
                        label: route.options.accessibility_label.clone(),
                        test_id: route.options.test_id.clone(),
                    },
                }
            })
            .collect();

        TabBarFrame {
            tab_width: self.tab_width(),
            blob_offset: self.blob_offset.value(),
            items,
        }
    }

    /// Tap on tab `index`
    ///
    /// Navigates only to an unfocused tab whose press was not prevented.
    pub fn press(&self, index: usize, navigator: &mut dyn TabNavigator) -> Result<(), TabBarError> {
        let route = self.route(index)?;
        let prevented = navigator.emit(&TabEvent {
            kind: TabEventKind::TabPress,
            target: route.key.clone(),
            can_prevent_default: true,
        });

        if index != self.index && !prevented {
            navigator.navigate(&route.name);
        }
        Ok(())
    }

    pub fn long_press(
        &self,
        index: usize,
        navigator: &mut dyn TabNavigator,
    ) -> Result<(), TabBarError> {
        let route = self.route(index)?;
        navigator.emit(&TabEvent {
            kind: TabEventKind::TabLongPress,
            target: route.key.clone(),
            can_prevent_default: false,
        });
        Ok(())
    }

    fn route(&self, index: usize) -> Result<&TabRoute, TabBarError> {
        self.routes.get(index).ok_or(TabBarError::IndexOutOfRange {
            index,
            len: self.routes.len(),
        })
    }

    fn blob_target(&self) -> f64 {
        self.index as f64 * self.tab_width()
    }
}

fn check_index(index: usize, len: usize) -> Result<(), TabBarError> {
    if len == 0 {
        return Err(TabBarError::NoRoutes);
    }
    if index >= len {
        return Err(TabBarError::IndexOutOfRange { index, len });
    }
    Ok(())
}
