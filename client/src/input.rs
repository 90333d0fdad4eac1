//! Terminal prompts for the interactive client

use shared::RequestKind;
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// Login details as typed by the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    /// `None` logs in as a guest
    pub password: Option<String>,
}

/// A request type as typed by the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Choice {
    Request(RequestKind),
    Invalid(String),
}

/// Reads answers from `R` and writes prompts to `W`
///
/// Every prompt returns `Ok(None)` once the input is exhausted.
pub struct Prompter<R, W> {
    reader: R,
    writer: W,
}

impl<R, W> Prompter<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    pub fn into_inner(self) -> (R, W) {
        (self.reader, self.writer)
    }

    /// Writes a line of text
    pub async fn say(&mut self, text: &str) -> io::Result<()> {
        self.writer.write_all(text.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await
    }

    /// Asks for a username until one is given, then for an optional password
    pub async fn credentials(&mut self) -> io::Result<Option<Credentials>> {
        let username = loop {
            let Some(username) = self.ask("Please enter the username: ").await? else {
                return Ok(None);
            };
            if !username.is_empty() {
                break username;
            }
            self.say("Username is required.").await?;
        };

        let Some(password) = self
            .ask("Please enter the password: (Press \"Enter\" to skip) ")
            .await?
        else {
            return Ok(None);
        };

        Ok(Some(Credentials {
            username,
            password: Some(password).filter(|password| !password.is_empty()),
        }))
    }

    /// Asks for a room code until a non-empty one is given
    pub async fn room(&mut self) -> io::Result<Option<String>> {
        loop {
            let Some(room) = self.ask("Please enter the room code: ").await? else {
                return Ok(None);
            };
            if !room.is_empty() {
                return Ok(Some(room));
            }
            self.say("Room is required.\n").await?;
        }
    }

    pub async fn request_kind(&mut self) -> io::Result<Option<Choice>> {
        let answer = self
            .ask(concat!(
                "Would you like to search for the availability or make a reservation? ",
                "(Enter \"Availability\" to search for the availability or Enter ",
                "\"Reservation\" to make a reservation ): "
            ))
            .await?;

        Ok(answer.map(|answer| match answer.as_str() {
            "Availability" => Choice::Request(RequestKind::Availability),
            "Reservation" => Choice::Request(RequestKind::Reservation),
            _ => Choice::Invalid(answer),
        }))
    }

    async fn ask(&mut self, prompt: &str) -> io::Result<Option<String>> {
        self.writer.write_all(prompt.as_bytes()).await?;
        self.writer.flush().await?;

        let mut line = String::new();
        if self.reader.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;
    use tokio_test::assert_ok;

    fn prompter(input: &'static str) -> Prompter<&'static [u8], Vec<u8>> {
        Prompter::new(input.as_bytes(), Vec::new())
    }

    #[tokio::test]
    async fn test_member_credentials() {
        let mut prompts = prompter("alice\nsecret\n");
        let credentials = assert_ok!(prompts.credentials().await);

        assert_eq!(
            credentials,
            Some(Credentials {
                username: "alice".to_string(),
                password: Some("secret".to_string()),
            })
        );
    }

    #[tokio::test]
    async fn test_empty_username_is_asked_again_and_empty_password_means_guest() {
        let mut prompts = prompter("\nbob\r\n\n");
        let credentials = assert_ok!(prompts.credentials().await);

        assert_eq!(
            credentials,
            Some(Credentials {
                username: "bob".to_string(),
                password: None,
            })
        );
        let (_, written) = prompts.into_inner();
        assert!(String::from_utf8_lossy(&written).contains("Username is required."));
    }

    #[tokio::test]
    async fn test_room_is_required() {
        let mut prompts = prompter("\n\nS101\n");
        assert_eq!(assert_ok!(prompts.room().await), Some("S101".to_string()));

        let (_, written) = prompts.into_inner();
        let written = String::from_utf8_lossy(&written).into_owned();
        assert_eq!(written.matches("Room is required.").count(), 2);
    }

    #[tokio::test]
    async fn test_request_choices() {
        let mut prompts = prompter("Availability\nReservation\nreservation\n");

        assert_eq!(
            assert_ok!(prompts.request_kind().await),
            Some(Choice::Request(RequestKind::Availability))
        );
        assert_eq!(
            assert_ok!(prompts.request_kind().await),
            Some(Choice::Request(RequestKind::Reservation))
        );
        assert_eq!(
            assert_ok!(prompts.request_kind().await),
            Some(Choice::Invalid("reservation".to_string()))
        );
        assert_eq!(assert_ok!(prompts.request_kind().await), None);
    }

    #[tokio::test]
    async fn test_prompt_text_over_mock_io() {
        let reader = tokio_test::io::Builder::new().read(b"S201\n").build();
        let writer = tokio_test::io::Builder::new()
            .write(b"Please enter the room code: ")
            .build();

        let mut prompts = Prompter::new(BufReader::new(reader), writer);
        assert_eq!(assert_ok!(prompts.room().await), Some("S201".to_string()));
    }

    #[tokio::test]
    async fn test_exhausted_input() {
        let mut prompts = prompter("");
        assert_eq!(assert_ok!(prompts.credentials().await), None);
        assert_eq!(assert_ok!(prompts.room().await), None);
    }
}
