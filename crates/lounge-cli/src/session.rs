use std::io::Write;

use anyhow::{bail, Context, Result};
use console::style;

use lounge::models::message::Message;
use lounge::relay::consumer;

/// One conversation with the relay. The persona, transcript, and server URL
/// travel with the session value; there is no global state.
pub struct ChatSession {
    server_url: String,
    persona: String,
    preamble: String,
    voice: bool,
    transcript: Vec<Message>,
    client: reqwest::Client,
}

impl ChatSession {
    pub fn new(server_url: String, name: String, personality: String, voice: bool) -> Self {
        let preamble = format!(
            "You are {}. {}. Keep responses concise and friendly (1-3 sentences).",
            name, personality
        );

        Self {
            server_url,
            persona: name,
            preamble,
            voice,
            transcript: Vec::new(),
            client: reqwest::Client::new(),
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        cliclack::intro(style(" lounge ").on_cyan().black())?;

        loop {
            let input: String = cliclack::input("You:")
                .placeholder("say hi, or /exit")
                .interact()?;
            let trimmed = input.trim();
            if trimmed.is_empty() {
                continue;
            }
            if trimmed == "/exit" || trimmed == "/quit" {
                break;
            }
            self.send(trimmed).await?;
        }

        cliclack::outro("See you in the lounge!")?;
        Ok(())
    }

    /// Submit one user turn and stream the reply into the terminal as it
    /// arrives.
    pub async fn send(&mut self, message: &str) -> Result<()> {
        let outbound = self.outbound_messages(message);

        let response = self
            .client
            .post(format!("{}/chat", self.server_url.trim_end_matches('/')))
            .json(&serde_json::json!({ "messages": outbound }))
            .send()
            .await
            .context("relay request failed")?;

        if !response.status().is_success() {
            bail!("relay returned {}", response.status());
        }

        print!("{} ", style(format!("{}:", self.persona)).cyan().bold());
        std::io::stdout().flush().ok();

        let mut reply = consumer::collect_reply(response.bytes_stream(), |delta| {
            print!("{}", delta);
            std::io::stdout().flush().ok();
        })
        .await
        .context("reply stream failed")?;

        if reply.trim().is_empty() {
            reply = consumer::EMPTY_REPLY_PHRASE.to_string();
            print!("{}", reply);
            std::io::stdout().flush().ok();
        }
        println!();

        self.transcript.push(Message::user(message));
        self.transcript.push(Message::assistant(reply.clone()));

        if self.voice {
            self.speak(&reply).await;
        }

        Ok(())
    }

    /// The full payload for one request: instruction preamble first, then
    /// the running transcript, then the new user turn.
    fn outbound_messages(&self, message: &str) -> Vec<Message> {
        let mut outbound = vec![Message::system(self.preamble.clone())];
        outbound.extend(self.transcript.iter().cloned());
        outbound.push(Message::user(message));
        outbound
    }

    /// Request spoken audio once the full reply is known. Runs on the
    /// finalized transcript only, never on partial deltas.
    async fn speak(&self, reply: &str) {
        let text = consumer::speech_text(reply);

        let result = self
            .client
            .post(format!("{}/tts", self.server_url.trim_end_matches('/')))
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => match response.bytes().await {
                Ok(audio) => {
                    let path = std::env::temp_dir().join("lounge-reply.mp3");
                    match std::fs::write(&path, &audio) {
                        Ok(()) => println!(
                            "{}",
                            style(format!("(voice saved to {})", path.display())).dim()
                        ),
                        Err(error) => eprintln!("could not save audio: {}", error),
                    }
                }
                Err(error) => eprintln!("voice download failed: {}", error),
            },
            Ok(response) => eprintln!("voice request failed: {}", response.status()),
            Err(error) => eprintln!("voice request failed: {}", error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lounge::models::role::Role;

    #[test]
    fn test_outbound_messages_lead_with_the_preamble() {
        let mut session = ChatSession::new(
            "http://127.0.0.1:3000".to_string(),
            "Lily".to_string(),
            "a friendly guide".to_string(),
            false,
        );
        session.transcript.push(Message::user("earlier question"));
        session.transcript.push(Message::assistant("earlier answer"));

        let outbound = session.outbound_messages("new question");

        assert_eq!(outbound.len(), 4);
        assert_eq!(outbound[0].role, Role::System);
        assert!(outbound[0].content.starts_with("You are Lily."));
        assert_eq!(outbound[1].content, "earlier question");
        assert_eq!(outbound[2].content, "earlier answer");
        assert_eq!(outbound.last().unwrap().role, Role::User);
        assert_eq!(outbound.last().unwrap().content, "new question");
    }
}
