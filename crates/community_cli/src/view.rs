//! Plain-text rendering of the views.

use community_core::{Draft, Post, Route};
use std::fmt::Write;

pub const ALERT_SAVE_FAILED: &str = "게시글 저장 중 오류가 발생했습니다.";
pub const ALERT_DELETE_FAILED: &str = "게시글 삭제 중 오류가 발생했습니다.";
pub const ALERT_ASSIST_FAILED: &str = "AI 글 생성에 실패했습니다.";
pub const TITLE_REQUIRED: &str = "제목을 입력하세요";

const EMPTY_FEED: &str = "아직 게시글이 없습니다.";
const EMPTY_FEED_HINT: &str = "멋진 서식 도구를 사용해 첫 글을 남겨보세요!";
const RULE: &str = "────────────────────────────────────────";

pub const FEED_HELP: &str = "\
commands:
  title <text>   set the draft title
  body <html>    set the draft body (HTML allowed)
  ai             fill the draft with an AI suggestion
  post           publish the draft
  rm <id>        delete a post
  logout         sign out
  go <path>      navigate (/, /login, /signup)
  help           show this help
  quit           exit";

pub fn alert(message: &str) -> String {
    format!("[알림] {message}")
}

pub fn placeholder() -> &'static str {
    "..."
}

pub fn auth_header(route: Route) -> String {
    let (title, other) = match route {
        Route::Signup => ("회원가입", "go /login"),
        _ => ("로그인", "go /signup"),
    };
    format!("{RULE}\n{title}\n{RULE}\n(`{other}` to switch, `quit` to exit)")
}

pub fn feed_screen(email: Option<&str>, draft: &Draft, generating: bool, posts: &[Post]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "Community        Welcome back, {}", email.unwrap_or(""));
    let _ = writeln!(out, "{RULE}");
    out.push_str(&composer_block(draft, generating));
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "최신 게시글  (총 {}개)", posts.len());

    if posts.is_empty() {
        let _ = writeln!(out, "\n  {EMPTY_FEED}\n  {EMPTY_FEED_HINT}");
    }
    for post in posts {
        out.push('\n');
        out.push_str(&post_card(post));
    }
    out
}

fn composer_block(draft: &Draft, generating: bool) -> String {
    let title = if draft.title.is_empty() {
        "(제목을 입력하세요)".to_string()
    } else {
        draft.title.clone()
    };
    let body = community_core::richtext::to_plain_text(&draft.content);
    let body = if body.trim().is_empty() {
        "(당신의 이야기를 서식과 함께 자유롭게 작성해보세요...)".to_string()
    } else {
        body
    };
    let status = if generating {
        "AI가 서식 맞춰 작성 중..."
    } else {
        "ready"
    };
    format!("제목: {title}\n본문: {body}\n[{status}]\n")
}

fn post_card(post: &Post) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "[{}] {}  ·  {}  (id: {})",
        post.avatar_initial(),
        post.author,
        post.time_label(),
        post.id
    );
    let _ = writeln!(out, "  {}", post.title);
    for line in post.plain_content().lines() {
        let _ = writeln!(out, "  {line}");
    }
    out
}
