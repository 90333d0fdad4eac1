//! Line-oriented message bodies exchanged between client, broker and backends
//!
//! Requests are `<request_type>\n<room_id>`. Replies are a single status
//! token, optionally followed by a count line after a successful reservation.
//! Authentication bodies are `<username>\n<secret?>`. Every token is a single
//! character on the wire.

/// An empty receive on a stream means the peer closed the connection
pub const CLOSED_CONNECTION: &str = "";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Availability,
    Reservation,
}

impl RequestKind {
    pub const fn token(self) -> &'static str {
        match self {
            RequestKind::Availability => "A",
            RequestKind::Reservation => "R",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "A" => Some(RequestKind::Availability),
            "R" => Some(RequestKind::Reservation),
            _ => None,
        }
    }
}

/// Broker's answer to an authentication attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    ValidMember,
    ValidGuest,
    InvalidPassword,
    InvalidUser,
}

impl AuthStatus {
    pub const fn token(self) -> &'static str {
        match self {
            AuthStatus::ValidMember => "0",
            AuthStatus::ValidGuest => "1",
            AuthStatus::InvalidPassword => "2",
            AuthStatus::InvalidUser => "3",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "0" => Some(AuthStatus::ValidMember),
            "1" => Some(AuthStatus::ValidGuest),
            "2" => Some(AuthStatus::InvalidPassword),
            "3" => Some(AuthStatus::InvalidUser),
            _ => None,
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, AuthStatus::ValidMember | AuthStatus::ValidGuest)
    }
}

/// Outcome of an availability or reservation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomStatus {
    Available,
    NotAvailable,
    NotFound,
    UserNotMember,
    RequestEmpty,
    RoomEmpty,
    InvalidRequest,
}

impl RoomStatus {
    pub const fn token(self) -> &'static str {
        match self {
            RoomStatus::Available => "0",
            RoomStatus::NotAvailable => "1",
            RoomStatus::NotFound => "2",
            RoomStatus::UserNotMember => "3",
            RoomStatus::RequestEmpty => "4",
            RoomStatus::RoomEmpty => "5",
            RoomStatus::InvalidRequest => "6",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "0" => Some(RoomStatus::Available),
            "1" => Some(RoomStatus::NotAvailable),
            "2" => Some(RoomStatus::NotFound),
            "3" => Some(RoomStatus::UserNotMember),
            "4" => Some(RoomStatus::RequestEmpty),
            "5" => Some(RoomStatus::RoomEmpty),
            "6" => Some(RoomStatus::InvalidRequest),
            _ => None,
        }
    }
}

/// A request split into its two lines, request type not yet interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRequest<'a> {
    pub kind: &'a str,
    pub room: &'a str,
}

impl RawRequest<'_> {
    pub fn request_kind(&self) -> Option<RequestKind> {
        RequestKind::from_token(self.kind)
    }
}

/// Splits a request body into request type and room
///
/// A missing or blank type line yields [`RoomStatus::RequestEmpty`], a
/// missing or blank room line [`RoomStatus::RoomEmpty`].
pub fn parse_request(body: &str) -> Result<RawRequest<'_>, RoomStatus> {
    let mut lines = body.lines();

    let kind = match lines.next() {
        Some(kind) if !kind.is_empty() => kind,
        _ => return Err(RoomStatus::RequestEmpty),
    };
    let room = match lines.next() {
        Some(room) if !room.is_empty() => room,
        _ => return Err(RoomStatus::RoomEmpty),
    };

    Ok(RawRequest { kind, room })
}

pub fn encode_request(kind: RequestKind, room: &str) -> String {
    format!("{}\n{}", kind.token(), room)
}

/// A backend reply: the status line and, after a successful reservation,
/// the remaining count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reply<'a> {
    pub status: &'a str,
    pub count: Option<&'a str>,
}

impl Reply<'_> {
    /// Remaining count as reported, 0 when missing or unparseable
    pub fn count_or_zero(&self) -> u32 {
        self.count
            .and_then(|count| count.trim().parse().ok())
            .unwrap_or(0)
    }
}

pub fn parse_reply(body: &str) -> Reply<'_> {
    let mut lines = body.lines();
    Reply {
        status: lines.next().unwrap_or(""),
        count: lines.next(),
    }
}

/// Reply a backend sends after decrementing a room
pub fn encode_reservation_success(remaining: u32) -> String {
    format!("{}\n{}", RoomStatus::Available.token(), remaining)
}

/// Authentication body as sent by a client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRequest<'a> {
    Member { username: &'a str, secret: &'a str },
    Guest { username: &'a str },
}

impl<'a> AuthRequest<'a> {
    pub fn username(&self) -> &'a str {
        match self {
            AuthRequest::Member { username, .. } | AuthRequest::Guest { username } => username,
        }
    }
}

/// Parses an authentication body; `None` when there is no username line
///
/// A present, non-empty secret line makes it a member login.
pub fn parse_auth(body: &str) -> Option<AuthRequest<'_>> {
    let mut lines = body.lines();
    let username = lines.next()?;

    match lines.next() {
        Some(secret) if !secret.is_empty() => Some(AuthRequest::Member { username, secret }),
        _ => Some(AuthRequest::Guest { username }),
    }
}

pub fn encode_auth(username: &str, secret: Option<&str>) -> String {
    format!("{}\n{}", username, secret.unwrap_or(""))
}
