use serde::{Deserialize, Serialize};
use std::fmt;

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_ID_LENGTH: usize = 16;
pub const MAX_ENTRY_LENGTH: usize = 40;
pub const MAX_PACKET_SIZE: usize = 8192;
pub const HEARTBEAT_INTERVAL_MS: u64 = 1000;
pub const CLIENT_TIMEOUT_SECS: u64 = 5;

pub const TEAM_OPTION_FRIENDLY_FIRE: u8 = 0x01;
pub const TEAM_OPTION_SEE_INVISIBLES: u8 = 0x02;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    Connect { client_version: u32, name: String },
    Heartbeat,
    Disconnect,

    Connected { viewer_id: u32 },
    Disconnected { reason: String },
    Scoreboard(ScoreboardPacket),
}

/// A single scoreboard state-sync message.
///
/// Variant order and the mode enums' variant order are part of the wire
/// format: bincode writes the variant index, which must match the protocol ids.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum ScoreboardPacket {
    Objective {
        name: String,
        mode: ObjectiveMode,
        title: Text,
        render: RenderType,
    },
    DisplayObjective {
        position: u8,
        name: String,
    },
    Score {
        entry: String,
        objective: String,
        action: ScoreAction,
        value: i32,
    },
    Team {
        name: String,
        mode: TeamMode,
        info: Option<TeamInfo>,
        entries: Vec<String>,
    },
}

impl ScoreboardPacket {
    pub fn objective(id: &str, mode: ObjectiveMode, title: &Text) -> Self {
        ScoreboardPacket::Objective {
            name: truncate(id, MAX_ID_LENGTH).to_string(),
            mode,
            title: title.clone(),
            render: RenderType::Integer,
        }
    }

    pub fn display(slot: DisplaySlot, id: &str) -> Self {
        ScoreboardPacket::DisplayObjective {
            position: slot.position(),
            name: truncate(id, MAX_ID_LENGTH).to_string(),
        }
    }

    pub fn score(entry: &str, objective: &str, action: ScoreAction, value: i32) -> Self {
        ScoreboardPacket::Score {
            entry: truncate(entry, MAX_ENTRY_LENGTH).to_string(),
            objective: truncate(objective, MAX_ID_LENGTH).to_string(),
            action,
            value,
        }
    }

    pub fn team<'a, I>(id: &str, mode: TeamMode, info: Option<TeamInfo>, entries: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        ScoreboardPacket::Team {
            name: truncate(id, MAX_ID_LENGTH).to_string(),
            mode,
            info,
            entries: entries
                .into_iter()
                .map(|entry| truncate(entry, MAX_ENTRY_LENGTH).to_string())
                .collect(),
        }
    }

    /// Wire name of the objective or team this packet targets
    pub fn target(&self) -> &str {
        match self {
            ScoreboardPacket::Objective { name, .. }
            | ScoreboardPacket::DisplayObjective { name, .. }
            | ScoreboardPacket::Team { name, .. } => name,
            ScoreboardPacket::Score { objective, .. } => objective,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum ObjectiveMode {
    Create,
    Remove,
    UpdateTitle,
}

impl ObjectiveMode {
    pub fn id(self) -> u8 {
        match self {
            ObjectiveMode::Create => 0,
            ObjectiveMode::Remove => 1,
            ObjectiveMode::UpdateTitle => 2,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum TeamMode {
    Create,
    Remove,
    UpdateInfo,
    AddEntries,
    RemoveEntries,
}

impl TeamMode {
    pub fn id(self) -> u8 {
        match self {
            TeamMode::Create => 0,
            TeamMode::Remove => 1,
            TeamMode::UpdateInfo => 2,
            TeamMode::AddEntries => 3,
            TeamMode::RemoveEntries => 4,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum ScoreAction {
    Change,
    Remove,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum RenderType {
    Integer,
    Hearts,
}

/// Full team metadata record. Teams only support whole-record updates.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TeamInfo {
    pub display_name: Text,
    pub prefix: Text,
    pub suffix: Text,
    pub options: u8,
    pub name_tag_visibility: String,
    pub collision_rule: String,
    pub color: u8,
}

impl TeamInfo {
    pub fn friendly_fire(&self) -> bool {
        self.options & TEAM_OPTION_FRIENDLY_FIRE != 0
    }

    pub fn see_friendly_invisibles(&self) -> bool {
        self.options & TEAM_OPTION_SEE_INVISIBLES != 0
    }
}

pub fn pack_team_options(friendly_fire: bool, see_friendly_invisibles: bool) -> u8 {
    let mut options = 0;
    if friendly_fire {
        options |= TEAM_OPTION_FRIENDLY_FIRE;
    }
    if see_friendly_invisibles {
        options |= TEAM_OPTION_SEE_INVISIBLES;
    }
    options
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisplaySlot {
    PlayerList,
    Sidebar,
    BelowName,
}

impl DisplaySlot {
    pub const ALL: [DisplaySlot; 3] = [
        DisplaySlot::PlayerList,
        DisplaySlot::Sidebar,
        DisplaySlot::BelowName,
    ];

    pub fn position(self) -> u8 {
        match self {
            DisplaySlot::PlayerList => 0,
            DisplaySlot::Sidebar => 1,
            DisplaySlot::BelowName => 2,
        }
    }

    pub fn from_position(position: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|slot| slot.position() == position)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleValue {
    Always,
    Never,
    HideForOtherTeams,
    HideForOwnTeam,
}

impl RuleValue {
    pub const ALL: [RuleValue; 4] = [
        RuleValue::Always,
        RuleValue::Never,
        RuleValue::HideForOtherTeams,
        RuleValue::HideForOwnTeam,
    ];

    pub fn wire_name(self) -> &'static str {
        match self {
            RuleValue::Always => "always",
            RuleValue::Never => "never",
            RuleValue::HideForOtherTeams => "hideForOtherTeams",
            RuleValue::HideForOwnTeam => "hideForOwnTeam",
        }
    }

    pub fn from_wire_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|rule| rule.wire_name() == name)
    }
}

/// Legacy chat formatting codes, in protocol order.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChatColor {
    Black,
    DarkBlue,
    DarkGreen,
    DarkAqua,
    DarkRed,
    DarkPurple,
    Gold,
    Gray,
    DarkGray,
    Blue,
    Green,
    Aqua,
    Red,
    LightPurple,
    Yellow,
    White,
    Magic,
    Bold,
    Strikethrough,
    Underline,
    Italic,
    Reset,
}

impl ChatColor {
    pub const ALL: [ChatColor; 22] = [
        ChatColor::Black,
        ChatColor::DarkBlue,
        ChatColor::DarkGreen,
        ChatColor::DarkAqua,
        ChatColor::DarkRed,
        ChatColor::DarkPurple,
        ChatColor::Gold,
        ChatColor::Gray,
        ChatColor::DarkGray,
        ChatColor::Blue,
        ChatColor::Green,
        ChatColor::Aqua,
        ChatColor::Red,
        ChatColor::LightPurple,
        ChatColor::Yellow,
        ChatColor::White,
        ChatColor::Magic,
        ChatColor::Bold,
        ChatColor::Strikethrough,
        ChatColor::Underline,
        ChatColor::Italic,
        ChatColor::Reset,
    ];

    pub const SECTION_SIGN: char = '\u{00A7}';

    pub fn code(self) -> char {
        match self {
            ChatColor::Black => '0',
            ChatColor::DarkBlue => '1',
            ChatColor::DarkGreen => '2',
            ChatColor::DarkAqua => '3',
            ChatColor::DarkRed => '4',
            ChatColor::DarkPurple => '5',
            ChatColor::Gold => '6',
            ChatColor::Gray => '7',
            ChatColor::DarkGray => '8',
            ChatColor::Blue => '9',
            ChatColor::Green => 'a',
            ChatColor::Aqua => 'b',
            ChatColor::Red => 'c',
            ChatColor::LightPurple => 'd',
            ChatColor::Yellow => 'e',
            ChatColor::White => 'f',
            ChatColor::Magic => 'k',
            ChatColor::Bold => 'l',
            ChatColor::Strikethrough => 'm',
            ChatColor::Underline => 'n',
            ChatColor::Italic => 'o',
            ChatColor::Reset => 'r',
        }
    }

    pub fn from_code(code: char) -> Option<Self> {
        let code = code.to_ascii_lowercase();
        Self::ALL.into_iter().find(|color| color.code() == code)
    }

    /// Index into the protocol's formatting enum
    pub fn wire_index(self) -> u8 {
        self as u8
    }

    pub fn from_wire_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    /// True for the sixteen real colors, false for format modifiers and reset
    pub fn is_color(self) -> bool {
        self.wire_index() < 16
    }

    /// The two-character legacy code, e.g. `§c`
    pub fn legacy(self) -> String {
        format!("{}{}", Self::SECTION_SIGN, self.code())
    }
}

impl fmt::Display for ChatColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", Self::SECTION_SIGN, self.code())
    }
}

/// Rich text as carried by titles, prefixes and suffixes.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash, Default)]
pub struct Text {
    pub content: String,
    pub color: Option<ChatColor>,
}

impl Text {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            color: None,
        }
    }

    pub fn colored(content: impl Into<String>, color: ChatColor) -> Self {
        Self {
            content: content.into(),
            color: Some(color),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

impl From<&str> for Text {
    fn from(content: &str) -> Self {
        Text::new(content)
    }
}

impl From<String> for Text {
    fn from(content: String) -> Self {
        Text::new(content)
    }
}

impl fmt::Display for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(color) = self.color {
            write!(f, "{}", color)?;
        }
        f.write_str(&self.content)
    }
}

/// Cuts `value` to at most `max_chars` characters.
pub fn truncate(value: &str, max_chars: usize) -> &str {
    match value.char_indices().nth(max_chars) {
        Some((index, _)) => &value[..index],
        None => value,
    }
}
