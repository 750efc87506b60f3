use crate::board::{BoardMirror, SidebarView};
use macroquad::prelude::*;
use shared::ChatColor;

const FONT_SIZE: f32 = 20.0;
const LINE_HEIGHT: f32 = 22.0;
const PADDING: f32 = 8.0;
const SIDEBAR_WIDTH: f32 = 260.0;

#[derive(Debug, Clone)]
pub struct UiConfig {
    pub viewer_id: Option<u32>,
    pub name: String,
    pub status: Option<String>,
}

pub struct Renderer {
    width: f32,
    height: f32,
}

impl Renderer {
    pub fn new(width: usize, height: usize) -> Self {
        Renderer {
            width: width as f32,
            height: height as f32,
        }
    }

    pub fn render(&mut self, board: &BoardMirror, config: &UiConfig) {
        clear_background(Color::from_rgba(26, 26, 26, 255));

        self.draw_player_list(&board.player_list());
        if let Some(sidebar) = board.sidebar() {
            self.draw_sidebar(&sidebar);
        }
        self.draw_ui(config);
    }

    fn draw_sidebar(&mut self, sidebar: &SidebarView) {
        let rows = sidebar.lines.len() as f32 + 1.0;
        let box_height = rows * LINE_HEIGHT + PADDING * 2.0;
        let x = self.width - SIDEBAR_WIDTH - PADDING;
        let y = ((self.height - box_height) / 2.0).max(PADDING);

        draw_rectangle(
            x,
            y,
            SIDEBAR_WIDTH,
            box_height,
            Color::from_rgba(0, 0, 0, 120),
        );

        let title = &sidebar.title;
        let title_width = measure_text(&title.content, None, FONT_SIZE as u16, 1.0).width;
        draw_text(
            &title.content,
            x + (SIDEBAR_WIDTH - title_width) / 2.0,
            y + PADDING + FONT_SIZE,
            FONT_SIZE,
            title.color.map_or(WHITE, chat_color),
        );

        for (i, line) in sidebar.lines.iter().enumerate() {
            let line_y = y + PADDING + FONT_SIZE + LINE_HEIGHT * (i as f32 + 1.0);
            draw_text(
                &line.text,
                x + PADDING,
                line_y,
                FONT_SIZE,
                line.color.map_or(WHITE, chat_color),
            );
        }
    }

    fn draw_player_list(&mut self, players: &[(String, i32)]) {
        if players.is_empty() {
            return;
        }

        let x = self.width / 2.0 - 120.0;
        let mut y = PADDING + FONT_SIZE;
        for (name, score) in players {
            draw_text(name, x, y, FONT_SIZE, WHITE);
            let score_text = score.to_string();
            draw_text(&score_text, x + 200.0, y, FONT_SIZE, YELLOW);
            y += LINE_HEIGHT;
        }
    }

    fn draw_ui(&mut self, config: &UiConfig) {
        let y = self.height - PADDING;

        let connection_color = if config.viewer_id.is_some() { GREEN } else { RED };
        draw_rectangle(PADDING, y - 10.0, 8.0, 8.0, connection_color);

        let label = match (&config.status, config.viewer_id) {
            (Some(status), _) => status.clone(),
            (None, Some(id)) => format!("{} (#{})", config.name, id),
            (None, None) => "connecting...".to_string(),
        };
        draw_text(&label, PADDING + 14.0, y, 16.0, WHITE);
    }
}

/// Screen color of a chat color code; format codes render white
pub fn chat_color(color: ChatColor) -> Color {
    let (r, g, b) = match color {
        ChatColor::Black => (0, 0, 0),
        ChatColor::DarkBlue => (0, 0, 170),
        ChatColor::DarkGreen => (0, 170, 0),
        ChatColor::DarkAqua => (0, 170, 170),
        ChatColor::DarkRed => (170, 0, 0),
        ChatColor::DarkPurple => (170, 0, 170),
        ChatColor::Gold => (255, 170, 0),
        ChatColor::Gray => (170, 170, 170),
        ChatColor::DarkGray => (85, 85, 85),
        ChatColor::Blue => (85, 85, 255),
        ChatColor::Green => (85, 255, 85),
        ChatColor::Aqua => (85, 255, 255),
        ChatColor::Red => (255, 85, 85),
        ChatColor::LightPurple => (255, 85, 255),
        ChatColor::Yellow => (255, 255, 85),
        ChatColor::White
        | ChatColor::Magic
        | ChatColor::Bold
        | ChatColor::Strikethrough
        | ChatColor::Underline
        | ChatColor::Italic
        | ChatColor::Reset => (255, 255, 255),
    };
    Color::from_rgba(r, g, b, 255)
}
