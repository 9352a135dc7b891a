use lazy_static::lazy_static;
use nu_ansi_term::{AnsiGenericString, Color, Style};
use std::borrow::Cow;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

lazy_static! {
    pub static ref HEADING: Style = Color::Default.bold();
    pub static ref SUCCESS_INDICATOR: Style = Color::Green.bold();
    pub static ref REFERENCE_TEXT: Style = Color::Cyan.normal();
    pub static ref ERROR_INDICATOR: Style = Color::Red.bold();
    pub static ref WARNING_INDICATOR: Style = Color::Yellow.bold();
    pub static ref ERROR_TEXT: Style = Color::Default.bold();
    pub static ref WARNING_TEXT: Style = Color::Default.bold();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum ColorMode {
    On,
    Off,
}

static USE_COLOR: AtomicBool = AtomicBool::new(true);

pub fn configure_color(cmode: ColorMode) {
    USE_COLOR.store(cmode == ColorMode::On, Ordering::Relaxed);
}

pub fn color_mode() -> ColorMode {
    match USE_COLOR.load(Ordering::Relaxed) {
        true => ColorMode::On,
        false => ColorMode::Off,
    }
}

pub trait MaybePaint {
    /// Paints `input` when color is enabled, otherwise passes it through.
    #[must_use]
    fn maybe_paint<'a, I, S: 'a + ToOwned + ?Sized>(self, input: I) -> AnsiGenericString<'a, S>
    where
        I: Into<Cow<'a, S>>,
        <S as ToOwned>::Owned: fmt::Debug;
}

impl MaybePaint for Style {
    fn maybe_paint<'a, I, S: 'a + ToOwned + ?Sized>(self, input: I) -> AnsiGenericString<'a, S>
    where
        I: Into<Cow<'a, S>>,
        <S as ToOwned>::Owned: fmt::Debug,
    {
        match color_mode() {
            ColorMode::On => self.paint(input),
            ColorMode::Off => {
                let cow: Cow<'a, S> = input.into();

                cow.into()
            }
        }
    }
}
