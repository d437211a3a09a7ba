//! Message formatting: turns a [`Message`] into a [`FeedNode`].
//!
//! Every variant is assembled from the same sub-builders (avatar block,
//! author chip, timestamp, price tag); the variant only decides flags,
//! emphasis and the funding level of paid messages. Formatting is a pure
//! function of the message, the arrival time and the [`FormatContext`].

use bitflags::bitflags;
use chrono::{DateTime, Local, TimeZone};
use url::Url;

use crate::color::Rgb;
use crate::message::{Message, MessageKind};

/// Inline silhouette used when an avatar is missing or fails to load.
pub const PLACEHOLDER_AVATAR: &str = "data:image/svg+xml,%3Csvg xmlns='http://www.w3.org/2000/svg' width='24' height='24' fill='%23999'%3E%3Ccircle cx='12' cy='8' r='4'/%3E%3Cpath d='M12 14c-5 0-8 3-8 6h16c0-3-3-6-8-6z'/%3E%3C/svg%3E";

bitflags! {
    /// Variant markers carried by a rendered node.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct NodeFlags: u8 {
        /// Gift notification.
        const GIFT = 0b0000_0001;
        /// Subscription notification.
        const SUBSCRIBE = 0b0000_0010;
        /// Paid message with a funding level.
        const PAID = 0b0000_0100;
    }
}

/// Discrete styling tier of a super chat, `"1"` through `"7"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FundingLevel(u8);

impl FundingLevel {
    // (minimum price, level), highest first
    const TIERS: [(f64, u8); 6] = [
        (500.0, 7),
        (200.0, 6),
        (100.0, 5),
        (50.0, 4),
        (30.0, 3),
        (10.0, 2),
    ];

    /// Tier for a price.
    pub fn from_price(price: f64) -> Self {
        Self::TIERS
            .iter()
            .find(|(min, _)| price >= *min)
            .map_or(Self(1), |(_, level)| Self(*level))
    }

    /// Numeric level.
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Level as the attribute string used for styling.
    pub const fn as_str(self) -> &'static str {
        match self.0 {
            7 => "7",
            6 => "6",
            5 => "5",
            4 => "4",
            3 => "3",
            2 => "2",
            _ => "1",
        }
    }

    /// Background colour of the paid message header for this level.
    pub const fn header_color(self) -> Rgb {
        match self.0 {
            7 => Rgb::from_u32(0x00D0_0000),
            6 => Rgb::from_u32(0x00C2_185B),
            5 => Rgb::from_u32(0x00E6_2117),
            4 => Rgb::from_u32(0x00E6_5100),
            3 => Rgb::from_u32(0x00FF_B300),
            2 => Rgb::from_u32(0x0000_BFA5),
            _ => Rgb::from_u32(0x0015_65C0),
        }
    }
}

/// Where the avatar image comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AvatarSource {
    /// An absolute `http(s)` avatar fetched through the relay's image proxy.
    Proxied(String),
    /// Any other avatar value, used as-is.
    Direct(String),
    /// Built-in silhouette.
    Placeholder,
}

impl AvatarSource {
    /// Choose the source for an avatar value.
    pub fn resolve(avatar: Option<&str>, proxy: Option<&Url>) -> Self {
        let Some(avatar) = avatar.filter(|a| !a.is_empty()) else {
            return Self::Placeholder;
        };

        let is_remote = Url::parse(avatar)
            .map(|url| matches!(url.scheme(), "http" | "https"))
            .unwrap_or(false);

        match proxy {
            Some(proxy) if is_remote => Self::Proxied(format!(
                "{proxy}?url={}",
                urlencoding::encode(avatar)
            )),
            _ => Self::Direct(avatar.to_string()),
        }
    }

    /// URL to load.
    pub fn src(&self) -> &str {
        match self {
            Self::Proxied(src) | Self::Direct(src) => src,
            Self::Placeholder => PLACEHOLDER_AVATAR,
        }
    }

    /// Swap in the placeholder after a failed load.
    pub fn mark_failed(&mut self) {
        if !matches!(self, Self::Placeholder) {
            tracing::debug!(src = self.src(), "avatar failed to load, using placeholder");
            *self = Self::Placeholder;
        }
    }
}

/// Avatar block shown at the start of every item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvatarBlock {
    /// Image source.
    pub source: AvatarSource,
    /// Glyph drawn by text-only surfaces.
    pub initial: char,
}

impl AvatarBlock {
    fn build(message: &Message, ctx: &FormatContext) -> Self {
        let source = AvatarSource::resolve(message.avatar.as_deref(), ctx.proxy.as_ref());
        let initial = message
            .user_name
            .chars()
            .find(|c| !c.is_whitespace())
            .map_or('?', |c| c.to_uppercase().next().unwrap_or(c));
        Self { source, initial }
    }

    /// Glyph for text-only surfaces; the placeholder has no initial.
    pub fn glyph(&self) -> char {
        match self.source {
            AvatarSource::Placeholder => '●',
            _ => self.initial,
        }
    }
}

/// Author name plus badges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorChip {
    /// Display name, verbatim.
    pub name: String,
    /// Name colour, when the message supplied a usable one.
    pub color: Option<Rgb>,
    /// Bold name (paid messages).
    pub emphasized: bool,
    /// Platform badge.
    pub platform: Option<String>,
}

impl AuthorChip {
    fn build(message: &Message, emphasized: bool) -> Self {
        let color = message.color.as_deref().and_then(|raw| match raw.parse::<Rgb>() {
            Ok(rgb) => Some(rgb),
            Err(err) => {
                tracing::debug!(%err, "ignoring author colour");
                None
            }
        });
        Self {
            name: message.user_name.clone(),
            color,
            emphasized,
            platform: message.platform.clone(),
        }
    }
}

/// Price badge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceTag {
    /// Amount in yuan.
    pub amount: f64,
}

impl PriceTag {
    /// Badge text, e.g. `¥75.00`.
    pub fn text(&self) -> String {
        format!("¥{:.2}", self.amount)
    }

    /// Inverse of [`PriceTag::text`].
    pub fn parse(text: &str) -> Option<f64> {
        text.strip_prefix('¥')?.parse().ok()
    }
}

/// A formatted, surface-independent feed item.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedNode {
    /// Source variant.
    pub kind: MessageKind,
    /// Variant markers.
    pub flags: NodeFlags,
    /// Avatar block.
    pub avatar: AvatarBlock,
    /// `HH:MM` in local time.
    pub timestamp: String,
    /// Author chip.
    pub author: AuthorChip,
    /// Message text, verbatim.
    pub body: String,
    /// Price badge, when there is a positive price.
    pub price: Option<PriceTag>,
    /// Funding level of paid messages.
    pub funding: Option<FundingLevel>,
}

impl FeedNode {
    /// Displayed author name.
    pub fn displayed_user_name(&self) -> &str {
        &self.author.name
    }

    /// Displayed message text.
    pub fn displayed_content(&self) -> &str {
        &self.body
    }

    /// Displayed price badge text.
    pub fn displayed_price(&self) -> Option<String> {
        self.price.as_ref().map(PriceTag::text)
    }
}

/// Inputs to formatting that do not come from the message itself.
#[derive(Debug, Clone, Default)]
pub struct FormatContext {
    proxy: Option<Url>,
}

impl FormatContext {
    /// Route remote avatars through `proxy` (or not, with `None`).
    pub const fn new(proxy: Option<Url>) -> Self {
        Self { proxy }
    }
}

/// Format a timestamp as zero-padded `HH:MM`.
pub fn format_time<Tz: TimeZone>(time: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    time.format("%H:%M").to_string()
}

/// Build the node for `message`, which arrived at `arrived_at`.
pub fn format_message(
    message: &Message,
    arrived_at: DateTime<Local>,
    ctx: &FormatContext,
) -> FeedNode {
    let stamp = message
        .timestamp
        .map_or(arrived_at, |t| t.with_timezone(&Local));
    let price = message.display_price().map(|amount| PriceTag { amount });

    let (flags, funding) = match message.kind {
        MessageKind::Text => (NodeFlags::empty(), None),
        MessageKind::Gift => (NodeFlags::GIFT, None),
        MessageKind::Subscribe => (NodeFlags::SUBSCRIBE, None),
        MessageKind::SuperChat => (
            NodeFlags::PAID,
            Some(FundingLevel::from_price(message.price.unwrap_or_default())),
        ),
    };

    FeedNode {
        kind: message.kind,
        flags,
        avatar: AvatarBlock::build(message, ctx),
        timestamp: format_time(&stamp),
        author: AuthorChip::build(message, flags.contains(NodeFlags::PAID)),
        body: message.content.clone(),
        price,
        funding,
    }
}
