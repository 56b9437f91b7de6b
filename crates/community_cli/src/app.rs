//! Interactive session: route guard loop plus the login, signup and feed views.
//!
//! # Invariants
//! - The feed live query is open only while the feed view is shown.
//! - Every screen is chosen through `route::settle` on the current auth state.

use crate::view;
use anyhow::{Context, Result};
use community_core::route::{settle, ROOT_PATH};
use community_core::service::feed::DELETE_CONFIRM_PROMPT;
use community_core::{
    AppConfig, AssistOutcome, AuthContext, AuthState, Composer, DocumentStore, FeedError,
    FeedSynchronizer, FeedUpdate, GenerativeTextService, GuardState, IdentityProvider, Route,
    RouteDecision, SubmitError,
};
use log::{info, warn};
use std::sync::Arc;
use tokio::io::{self, AsyncBufReadExt, BufReader, Lines, Stdin};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

enum Input {
    Line(String),
    AuthChanged,
    Closed,
}

pub struct App {
    identity: Arc<dyn IdentityProvider>,
    auth: AuthContext,
    feed: FeedSynchronizer<dyn DocumentStore>,
    composer: Composer<dyn GenerativeTextService>,
    input: Lines<BufReader<Stdin>>,
    path: String,
}

impl App {
    /// Must be called inside the runtime; registers the session listener.
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn DocumentStore>,
        identity: Arc<dyn IdentityProvider>,
        generator: Arc<dyn GenerativeTextService>,
    ) -> Self {
        let auth = AuthContext::init(identity.as_ref());
        Self {
            identity,
            auth,
            feed: FeedSynchronizer::new(store, config.store.collection.clone())
                .with_mutation_timeout(config.feed.mutation_timeout()),
            composer: Composer::new(generator).with_assist_timeout(config.assist.timeout()),
            input: BufReader::new(io::stdin()).lines(),
            path: ROOT_PATH.to_string(),
        }
    }

    pub async fn run(mut self) -> Result<()> {
        loop {
            let state = self.auth.mark_seen();
            let flow = match settle(GuardState::from(&state), &self.path) {
                RouteDecision::Placeholder => self.placeholder_view().await?,
                RouteDecision::Render(route) | RouteDecision::Redirect(route) => {
                    self.path = route.path().to_string();
                    match route {
                        Route::Feed => self.feed_view(&state).await?,
                        Route::Login | Route::Signup => self.auth_view(route).await?,
                    }
                }
            };
            if flow == Flow::Quit {
                break;
            }
        }

        self.feed.deactivate();
        info!("event=app_exit module=cli status=ok");
        Ok(())
    }

    async fn next_input(&mut self) -> Result<Input> {
        tokio::select! {
            line = self.input.next_line() => {
                Ok(match line.context("failed to read stdin")? {
                    Some(line) => Input::Line(line),
                    None => Input::Closed,
                })
            }
            _ = self.auth.changed() => Ok(Input::AuthChanged),
        }
    }

    async fn read_line(&mut self) -> Result<Option<String>> {
        self.input.next_line().await.context("failed to read stdin")
    }

    async fn placeholder_view(&mut self) -> Result<Flow> {
        println!("{}", view::placeholder());
        match self.next_input().await? {
            Input::Closed => Ok(Flow::Quit),
            Input::Line(line) if line.trim() == "quit" => Ok(Flow::Quit),
            Input::Line(_) | Input::AuthChanged => Ok(Flow::Continue),
        }
    }

    async fn auth_view(&mut self, route: Route) -> Result<Flow> {
        println!("{}", view::auth_header(route));
        print!("email: ");
        flush_stdout();

        let email = match self.next_input().await? {
            Input::Closed => return Ok(Flow::Quit),
            Input::AuthChanged => return Ok(Flow::Continue),
            Input::Line(line) => line.trim().to_string(),
        };
        match parse_command(&email) {
            ("quit", _) => return Ok(Flow::Quit),
            ("go", target) => {
                self.path = target.to_string();
                return Ok(Flow::Continue);
            }
            _ if email.is_empty() => return Ok(Flow::Continue),
            _ => {}
        }

        print!("password: ");
        flush_stdout();
        let Some(password) = self.read_line().await? else {
            return Ok(Flow::Quit);
        };

        let result = match route {
            Route::Signup => self.identity.sign_up(&email, password.trim_end()).await,
            _ => self.identity.sign_in(&email, password.trim_end()).await,
        };
        match result {
            Ok(_) => {
                if self.auth.current_session().is_none() {
                    self.auth.changed().await;
                }
            }
            Err(err) => println!("{}", view::alert(&err.to_string())),
        }
        Ok(Flow::Continue)
    }

    async fn feed_view(&mut self, state: &AuthState) -> Result<Flow> {
        let email = state
            .current_session
            .as_ref()
            .and_then(|session| session.email.clone());

        if let Err(err) = self.feed.activate().await {
            println!("{}", view::alert(&err.to_string()));
        }
        self.render_feed(email.as_deref());
        println!("(type `help` for commands)");

        loop {
            tokio::select! {
                update = self.feed.next_update(), if self.feed.is_active() => match update {
                    Some(FeedUpdate::Replaced { .. }) => self.render_feed(email.as_deref()),
                    Some(FeedUpdate::ListenerFailed(err)) => {
                        println!("{}", view::alert(&err.to_string()));
                    }
                    None => warn!("event=feed_view module=cli status=listener_closed"),
                },
                line = self.input.next_line() => {
                    let Some(line) = line.context("failed to read stdin")? else {
                        return Ok(Flow::Quit);
                    };
                    if let Some(flow) = self.feed_command(&line, state, email.as_deref()).await? {
                        return Ok(flow);
                    }
                }
                _ = self.auth.changed() => {
                    if GuardState::from(&self.auth.state()) != GuardState::Authenticated {
                        self.feed.deactivate();
                        return Ok(Flow::Continue);
                    }
                }
            }
        }
    }

    /// Runs one feed command; `Some` leaves the feed view.
    async fn feed_command(
        &mut self,
        line: &str,
        state: &AuthState,
        email: Option<&str>,
    ) -> Result<Option<Flow>> {
        match parse_command(line) {
            ("", _) => {}
            ("title", text) => {
                self.composer.set_title(text);
                self.render_feed(email);
            }
            ("body", html) => {
                self.composer.set_content(html);
                self.render_feed(email);
            }
            ("ai", _) => {
                println!("AI가 서식 맞춰 작성 중...");
                if let AssistOutcome::Fallback(_) = self.composer.ai_assist().await {
                    println!("{}", view::alert(view::ALERT_ASSIST_FAILED));
                }
                self.render_feed(email);
            }
            ("post", _) => {
                match self
                    .composer
                    .submit(&self.feed, state.current_session.as_ref())
                    .await
                {
                    Ok(_) => {}
                    Err(SubmitError::NotReady) => {
                        println!("{}", view::alert(view::TITLE_REQUIRED));
                    }
                    Err(SubmitError::Feed(FeedError::Validation(err))) => {
                        println!("{err}");
                    }
                    Err(SubmitError::Feed(_)) => {
                        println!("{}", view::alert(view::ALERT_SAVE_FAILED));
                    }
                }
            }
            ("rm", id) if !id.is_empty() => self.delete(id).await?,
            ("logout", _) => {
                if let Err(err) = self.identity.sign_out().await {
                    warn!("event=sign_out module=cli status=error error={err}");
                }
            }
            ("go", target) => {
                self.feed.deactivate();
                self.path = target.to_string();
                return Ok(Some(Flow::Continue));
            }
            ("help", _) => println!("{}", view::FEED_HELP),
            ("quit", _) => return Ok(Some(Flow::Quit)),
            (other, _) => println!("unknown command `{other}`; type `help`"),
        }
        Ok(None)
    }

    async fn delete(&mut self, id: &str) -> Result<()> {
        print!("{DELETE_CONFIRM_PROMPT} [y/N] ");
        flush_stdout();
        let answer = self.read_line().await?;
        let approved = matches!(answer.as_deref().map(str::trim), Some("y" | "Y"));

        if self.feed.delete_post(id, |_| approved).await.is_err() {
            println!("{}", view::alert(view::ALERT_DELETE_FAILED));
        }
        Ok(())
    }

    fn render_feed(&self, email: Option<&str>) {
        println!(
            "{}",
            view::feed_screen(
                email,
                &self.composer.draft(),
                self.composer.is_generating(),
                self.feed.posts()
            )
        );
    }
}

/// Splits `line` into a command word and its trimmed argument.
fn parse_command(line: &str) -> (&str, &str) {
    let line = line.trim();
    match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    }
}

fn flush_stdout() {
    use std::io::Write;
    let _ = std::io::stdout().flush();
}

#[cfg(test)]
mod tests {
    use super::parse_command;

    #[test]
    fn commands_split_on_first_whitespace() {
        assert_eq!(parse_command("  title  Hello world "), ("title", "Hello world"));
        assert_eq!(parse_command("post"), ("post", ""));
        assert_eq!(parse_command("body <p>a b</p>"), ("body", "<p>a b</p>"));
        assert_eq!(parse_command(""), ("", ""));
    }
}
