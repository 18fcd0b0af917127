//! Terminal display: the rendering contract and a virtual OLED.
//!
//! The coordinator and the enrollment flow only talk to the [`Display`]
//! trait. [`VirtualDisplay`] implements it as a small text screen
//! (4 lines × 21 columns, the 6×8 font on a 128×64 panel) plus a model of
//! the 64×64 fingerprint pane, so the whole scan lifecycle can be observed
//! in tests and in the log without any hardware.
//!
//! # Character Encoding
//!
//! The panel font only covers printable ASCII (0x20-0x7E). Subject names come
//! from the operator and may carry accents, so text is transliterated
//! (`"Muñoz"` becomes `"Munoz"`) and anything without an ASCII form is
//! replaced by `?`.
//!
//! # Examples
//!
//! ```
//! use fpterm_core::TemplateId;
//! use fpterm_terminal::display::{Display, Screen, VirtualDisplay};
//!
//! let mut display = VirtualDisplay::new(4, 21, "FPTERM".to_string());
//! display.welcome(Some("José"), TemplateId::new(7).unwrap(), 95);
//!
//! assert_eq!(display.screen(), Screen::Welcome);
//! assert_eq!(display.get_line(0).unwrap().trim_end(), "Acceso concedido");
//! assert_eq!(display.get_line(2).unwrap().trim_end(), "Jose (ID 7)");
//! assert_eq!(display.get_line(3).unwrap().trim_end(), "Score: 95");
//! ```
//!
//! ## Builder Pattern
//!
//! ```
//! use fpterm_terminal::display::VirtualDisplay;
//!
//! let display = VirtualDisplay::builder()
//!     .with_size(2, 16)
//!     .with_default_message("WELCOME".to_string())
//!     .build();
//!
//! assert_eq!(display.get_line(0).unwrap().trim(), "WELCOME");
//! ```

use tracing::{debug, info};

use fpterm_core::constants::{FP_PANE_SIZE, PHASE_COUNT};
use fpterm_core::{Error, Result, TemplateId};

/// Number of text lines on the panel.
const DEFAULT_LINES: usize = 4;

/// Characters per line with the 6-pixel font.
const DEFAULT_COLUMNS: usize = 21;

/// Text shown while idle.
const DEFAULT_IDLE_MESSAGE: &str = "FPTERM";

/// Default body of [`Display::ok_msg`].
pub const DEFAULT_OK_MESSAGE: &str = "Lectura correcta";

/// Rendering surface used by the scan coordinator and enrollment.
///
/// Every call must return promptly; implementations draw into a frame
/// buffer, never wait for the panel.
pub trait Display: Send {
    /// Idle screen with the logo.
    fn idle(&mut self);

    /// "Place finger" prompt.
    fn prompt(&mut self);

    /// Scanning screen; the fingerprint pane is animated separately.
    fn scanning(&mut self);

    /// Breathing frame `0..PHASE_COUNT` of the fingerprint pane.
    fn draw_fp_phase(&mut self, phase: u8);

    /// Scanning overlay at row `y` of the fingerprint pane.
    fn draw_scan_bar(&mut self, y: u8);

    /// Access granted.
    fn welcome(&mut self, name: Option<&str>, id: TemplateId, score: u16);

    /// Failure headline with a short reason.
    fn error_msg(&mut self, msg: &str);

    /// Success headline with a short note; empty uses the default text.
    fn ok_msg(&mut self, msg: &str);

    /// Enrollment progress, `step` 1 or 2.
    fn enroll_step(&mut self, step: u8);
}

/// What the panel currently shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Screen {
    Idle,
    Prompt,
    Scanning,
    Welcome,
    Error,
    Ok,
    Enroll,
}

/// State of the 64×64 fingerprint pane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pane {
    /// Breathing frame, when the pane is shown.
    pub phase: Option<u8>,
    /// Top row of the scan bar, when the overlay is shown.
    pub scan_bar: Option<u8>,
}

/// Text alignment options for display lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    /// Text starts at column 0, padded with spaces on the right.
    Left,
    /// Text centered with equal padding on both sides (extra space on right if odd).
    Center,
    /// Text ends at the last column, padded with spaces on the left.
    Right,
}

/// In-memory OLED used by the emulated terminal and tests.
///
/// # Thread Safety
///
/// Not thread-safe by itself; the coordinator owns it exclusively.
#[derive(Debug, Clone)]
pub struct VirtualDisplay {
    /// Number of lines in the display.
    lines: usize,

    /// Number of columns per line.
    columns: usize,

    /// Current text buffer (ASCII only).
    buffer: Vec<String>,

    /// Logo text shown while idle.
    default_message: String,

    screen: Screen,
    pane: Pane,

    /// Number of draw calls so far.
    frames: u64,
}

impl VirtualDisplay {
    /// Create a display showing the idle screen.
    ///
    /// # Examples
    ///
    /// ```
    /// use fpterm_terminal::display::{Screen, VirtualDisplay};
    ///
    /// let display = VirtualDisplay::new(4, 21, "FPTERM".to_string());
    /// assert_eq!(display.screen(), Screen::Idle);
    /// assert_eq!(display.get_line(0).unwrap().trim(), "FPTERM");
    /// ```
    pub fn new(lines: usize, columns: usize, default_message: String) -> Self {
        let lines = lines.max(1);
        let default_message = transliterate(&default_message);
        let mut buffer = vec![" ".repeat(columns); lines];
        if !default_message.is_empty() {
            buffer[0] = align_text(&default_message, columns, Alignment::Center);
        }

        Self {
            lines,
            columns,
            buffer,
            default_message,
            screen: Screen::Idle,
            pane: Pane::default(),
            frames: 0,
        }
    }

    /// Create a builder for constructing a virtual display with custom configuration.
    pub fn builder() -> VirtualDisplayBuilder {
        VirtualDisplayBuilder::default()
    }

    /// Set text on a specific line with left alignment.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidLine` if `line` is out of bounds.
    pub fn set_line(&mut self, line: usize, text: &str) -> Result<()> {
        self.set_line_aligned(line, text, Alignment::Left)
    }

    /// Set text on a specific line with custom alignment.
    ///
    /// Text is transliterated to ASCII, control characters are removed, and
    /// the result is truncated to the column width.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidLine` if `line` is out of bounds.
    ///
    /// # Examples
    ///
    /// ```
    /// use fpterm_terminal::display::{Alignment, VirtualDisplay};
    ///
    /// let mut display = VirtualDisplay::new(2, 10, String::new());
    /// display.set_line_aligned(1, "OK", Alignment::Right).unwrap();
    /// assert_eq!(display.get_line(1).unwrap(), "        OK");
    /// assert!(display.set_line(2, "nope").is_err());
    /// ```
    pub fn set_line_aligned(&mut self, line: usize, text: &str, align: Alignment) -> Result<()> {
        if line >= self.lines {
            return Err(Error::InvalidLine {
                line,
                max: self.lines - 1,
            });
        }

        let sanitized = sanitize_text(&transliterate(text));
        self.buffer[line] = align_text(&sanitized, self.columns, align);
        Ok(())
    }

    /// Get the text on a specific line, padded to the column width.
    pub fn get_line(&self, line: usize) -> Option<&str> {
        self.buffer.get(line).map(String::as_str)
    }

    /// Get all lines, top to bottom.
    pub fn get_all_lines(&self) -> &[String] {
        &self.buffer
    }

    /// Blank every line and hide the pane.
    pub fn clear(&mut self) {
        for line in &mut self.buffer {
            *line = " ".repeat(self.columns);
        }
        self.pane = Pane::default();
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn pane(&self) -> Pane {
        self.pane
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn is_idle(&self) -> bool {
        self.screen == Screen::Idle
    }

    fn show(&mut self, screen: Screen, rows: &[(&str, Alignment)]) {
        self.clear();
        for (line, (text, align)) in rows.iter().enumerate().take(self.lines) {
            // Bounds are checked by `take`.
            let _ = self.set_line_aligned(line, text, *align);
        }
        self.frames += 1;

        if self.screen != screen {
            let text: Vec<&str> = self
                .buffer
                .iter()
                .map(|l| l.trim())
                .filter(|l| !l.is_empty())
                .collect();
            match screen {
                Screen::Welcome | Screen::Error | Screen::Ok => {
                    info!(?screen, text = %text.join(" | "), "Display")
                }
                _ => debug!(?screen, text = %text.join(" | "), "Display"),
            }
        }
        self.screen = screen;
    }
}

impl Display for VirtualDisplay {
    fn idle(&mut self) {
        let logo = self.default_message.clone();
        self.show(Screen::Idle, &[(&logo, Alignment::Center)]);
    }

    fn prompt(&mut self) {
        self.show(
            Screen::Prompt,
            &[("Ponga su", Alignment::Center), ("huella", Alignment::Center)],
        );
    }

    fn scanning(&mut self) {
        self.show(
            Screen::Scanning,
            &[("Escaneando...", Alignment::Left), ("mantener", Alignment::Left)],
        );
    }

    fn draw_fp_phase(&mut self, phase: u8) {
        self.pane.phase = Some(phase.min(PHASE_COUNT - 1));
        self.frames += 1;
    }

    fn draw_scan_bar(&mut self, y: u8) {
        self.pane.scan_bar = Some(y.min(FP_PANE_SIZE - 1));
        self.frames += 1;
    }

    fn welcome(&mut self, name: Option<&str>, id: TemplateId, score: u16) {
        let (greeting, who) = match name.filter(|n| !n.trim().is_empty()) {
            Some(name) => ("Bienvenido", format!("{} (ID {id})", name.trim())),
            None => ("ID OK", format!("ID {id}")),
        };
        let score = format!("Score: {score}");
        self.show(
            Screen::Welcome,
            &[
                ("Acceso concedido", Alignment::Left),
                (greeting, Alignment::Left),
                (&who, Alignment::Left),
                (&score, Alignment::Left),
            ],
        );
    }

    fn error_msg(&mut self, msg: &str) {
        self.show(
            Screen::Error,
            &[("ERROR", Alignment::Center), (msg, Alignment::Center)],
        );
    }

    fn ok_msg(&mut self, msg: &str) {
        let msg = if msg.is_empty() { DEFAULT_OK_MESSAGE } else { msg };
        self.show(
            Screen::Ok,
            &[("OK", Alignment::Center), (msg, Alignment::Center)],
        );
    }

    fn enroll_step(&mut self, step: u8) {
        let take = format!("Toma {step}");
        self.show(
            Screen::Enroll,
            &[
                ("Enrolamiento", Alignment::Center),
                (&take, Alignment::Center),
                ("Ponga su huella", Alignment::Center),
            ],
        );
    }
}

impl Default for VirtualDisplay {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builder for [`VirtualDisplay`].
#[derive(Debug)]
pub struct VirtualDisplayBuilder {
    lines: usize,
    columns: usize,
    default_message: String,
}

impl VirtualDisplayBuilder {
    /// Set the display size (lines and columns).
    pub fn with_size(mut self, lines: usize, columns: usize) -> Self {
        self.lines = lines;
        self.columns = columns;
        self
    }

    /// Set the logo text shown when idle.
    pub fn with_default_message(mut self, message: String) -> Self {
        self.default_message = message;
        self
    }

    pub fn build(self) -> VirtualDisplay {
        VirtualDisplay::new(self.lines, self.columns, self.default_message)
    }
}

impl Default for VirtualDisplayBuilder {
    fn default() -> Self {
        Self {
            lines: DEFAULT_LINES,
            columns: DEFAULT_COLUMNS,
            default_message: DEFAULT_IDLE_MESSAGE.to_string(),
        }
    }
}

/// Truncate text to a maximum number of characters.
///
/// ```
/// use fpterm_terminal::display::truncate_text;
///
/// assert_eq!(truncate_text("Escaneando...", 5), "Escan");
/// assert_eq!(truncate_text("OK", 10), "OK");
/// ```
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Align text within a fixed width, padding with spaces.
///
/// ```
/// use fpterm_terminal::display::{align_text, Alignment};
///
/// assert_eq!(align_text("HELLO", 10, Alignment::Left), "HELLO     ");
/// assert_eq!(align_text("HELLO", 10, Alignment::Center), "  HELLO   ");
/// assert_eq!(align_text("HELLO", 10, Alignment::Right), "     HELLO");
/// ```
pub fn align_text(text: &str, width: usize, alignment: Alignment) -> String {
    let char_count = text.chars().count();

    if char_count >= width {
        return truncate_text(text, width);
    }

    let padding = width - char_count;

    match alignment {
        Alignment::Left => format!("{}{}", text, " ".repeat(padding)),
        Alignment::Right => format!("{}{}", " ".repeat(padding), text),
        Alignment::Center => {
            let left_pad = padding / 2;
            let right_pad = padding - left_pad;
            format!("{}{}{}", " ".repeat(left_pad), text, " ".repeat(right_pad))
        }
    }
}

/// Map text onto the panel's ASCII font.
///
/// ```
/// use fpterm_terminal::display::transliterate;
///
/// assert_eq!(transliterate("Peña Álvarez"), "Pena Alvarez");
/// assert_eq!(transliterate("¿qué?"), "?que?");
/// ```
pub fn transliterate(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            ' '..='~' => c,
            'á' | 'à' | 'â' | 'ä' | 'ã' => 'a',
            'Á' | 'À' | 'Â' | 'Ä' | 'Ã' => 'A',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'É' | 'È' | 'Ê' | 'Ë' => 'E',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
            'ó' | 'ò' | 'ô' | 'ö' | 'õ' => 'o',
            'Ó' | 'Ò' | 'Ô' | 'Ö' | 'Õ' => 'O',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
            'ñ' => 'n',
            'Ñ' => 'N',
            'ç' => 'c',
            'Ç' => 'C',
            c if c.is_control() => c,
            _ => '?',
        })
        .collect()
}

/// Remove control characters and trim surrounding whitespace.
fn sanitize_text(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || *c == ' ')
        .collect::<String>()
        .trim()
        .to_string()
}
