use serde::Serialize;

pub const MENTION_REPLY: &str = "Yes, hello.";
pub const EMOJI_ADDED_TITLE: &str = "New emoji added! :wave:";
pub const EMOJIS_REMOVED_TITLE: &str = "Emojis Removed";
const EMOJI_SEPARATOR: &str = " — ";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum TextObject {
    #[serde(rename = "plain_text")]
    Plain { text: String },
    #[serde(rename = "mrkdwn")]
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into() }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Plain { text } | Self::Mrkdwn { text } => text,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Header { text: TextObject },
    Divider,
    Section { fields: Vec<TextObject> },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    #[serde(rename = "text")]
    pub fallback_text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<Block>,
}

impl MessageTemplate {
    pub fn header_text(&self) -> Option<&str> {
        self.blocks.iter().find_map(|block| match block {
            Block::Header { text } => Some(text.text()),
            _ => None,
        })
    }

    pub fn section_text(&self) -> Option<&str> {
        self.blocks.iter().find_map(|block| match block {
            Block::Section { fields } => fields.first().map(TextObject::text),
            _ => None,
        })
    }
}

pub struct MessageBuilder {
    fallback_text: String,
    blocks: Vec<Block>,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self { fallback_text: fallback_text.into(), blocks: Vec::new() }
    }

    pub fn header(mut self, title: impl Into<String>) -> Self {
        self.blocks.push(Block::Header { text: TextObject::plain(title) });
        self
    }

    pub fn divider(mut self) -> Self {
        self.blocks.push(Block::Divider);
        self
    }

    pub fn section<F>(mut self, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Section { fields: builder.build() });
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { fallback_text: self.fallback_text, blocks: self.blocks }
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    fields: Vec<TextObject>,
}

impl SectionBuilder {
    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.fields.push(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> Vec<TextObject> {
        self.fields
    }
}

/// Header, divider and a single markdown section; the title doubles as fallback text.
pub fn announcement(title: &str, body: impl Into<String>) -> MessageTemplate {
    MessageBuilder::new(title)
        .header(title)
        .divider()
        .section(|section| {
            section.mrkdwn(body);
        })
        .build()
}

pub fn mention_reply() -> MessageTemplate {
    MessageBuilder::new(MENTION_REPLY).build()
}

pub fn emoji_added_message(name: &str) -> MessageTemplate {
    announcement(EMOJI_ADDED_TITLE, format!(":{name}:{EMOJI_SEPARATOR}`:{name}:`"))
}

/// Returns `None` when there is nothing to announce.
pub fn emojis_removed_message<S: AsRef<str>>(names: &[S]) -> Option<MessageTemplate> {
    if names.is_empty() {
        return None;
    }

    let tokens =
        names.iter().map(|name| format!(":{}:", name.as_ref())).collect::<Vec<_>>();
    Some(announcement(EMOJIS_REMOVED_TITLE, format!("`{}`", tokens.join(EMOJI_SEPARATOR))))
}
