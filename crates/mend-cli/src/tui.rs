use crossterm::style::Color;
use crossterm::style::{ResetColor, SetForegroundColor};
use termimad::MadSkin;

/// Console output with markdown rendering for code listings and summaries.
pub struct SimpleOutput {
    mad_skin: MadSkin,
}

impl SimpleOutput {
    pub fn new() -> Self {
        let mut mad_skin = MadSkin::default();
        // Dracula palette
        mad_skin.set_headers_fg(Color::Rgb { r: 189, g: 147, b: 249 });
        mad_skin.bold.set_fg(Color::Rgb { r: 255, g: 121, b: 198 });
        mad_skin.code_block.set_bg(Color::Rgb { r: 68, g: 71, b: 90 });
        mad_skin.code_block.set_fg(Color::Rgb { r: 80, g: 250, b: 123 });
        mad_skin.inline_code.set_bg(Color::Rgb { r: 68, g: 71, b: 90 });
        mad_skin.inline_code.set_fg(Color::Rgb { r: 241, g: 250, b: 140 });

        Self { mad_skin }
    }

    pub fn print(&self, text: &str) {
        println!("{}", text);
    }

    pub fn print_markdown(&self, markdown: &str) {
        self.mad_skin.print_text(markdown);
    }

    /// Print a source listing as a fenced block.
    pub fn print_code(&self, language: &str, source: &str) {
        self.print_markdown(&code_block(language, source));
    }

    pub fn print_status(&self, passed: bool, text: &str) {
        let (color, icon) = if passed {
            (Color::Green, "✅")
        } else {
            (Color::Red, "❌")
        };
        println!("{}{} {}{}", SetForegroundColor(color), icon, text, ResetColor);
    }

    /// `Attempts: ●●○ 2/3`, coloured by how close the loop is to its ceiling.
    pub fn print_attempts(&self, used: u32, total: u32) {
        let color = if used <= 1 {
            Color::Green
        } else if used < total {
            Color::Yellow
        } else {
            Color::Red
        };

        print!("Attempts: ");
        print!("{}", SetForegroundColor(color));
        print!("{}", attempt_bar(used, total));
        print!("{}", ResetColor);
        println!(" {}/{}", used, total);
    }
}

impl Default for SimpleOutput {
    fn default() -> Self {
        Self::new()
    }
}

fn attempt_bar(used: u32, total: u32) -> String {
    let filled = used.min(total) as usize;
    let empty = total.saturating_sub(used) as usize;
    format!("{}{}", "●".repeat(filled), "○".repeat(empty))
}

fn code_block(language: &str, source: &str) -> String {
    let body = source.trim_end_matches('\n');
    format!("```{}\n{}\n```\n", language, body)
}
