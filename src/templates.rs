//! User-visible comment templates.

pub const DISCUSSION_ANSWER_SIGNATURE: &str = "\n\n---\n*I am an AI assistant. My answer is based on the repository's content and may not be perfect. Please verify important information.*";

pub const FOLLOW_UP_ANSWER_SIGNATURE: &str = "\n\n---\n*I am an AI assistant. My answer is based on the repository's content and may not be perfect.*";

pub fn discussion_acknowledgment(user: &str, title: &str) -> String {
    format!(
        "Hello @{user}! I'm an AI assistant for this repository. 🤖\n\n\
         I'm currently analyzing the repository's documentation and code to find an answer to your question: **\"{title}\"**\n\n\
         I'll be back with a response shortly."
    )
}

pub fn follow_up_acknowledgment(user: &str) -> String {
    format!("Thanks for the follow-up, @{user}! I'm looking into that for you. 🤖")
}

pub fn discussion_apology(user: &str) -> String {
    format!(
        "Sorry, @{user}. I encountered an error while trying to answer your question. A human collaborator will have to take a look."
    )
}

pub fn follow_up_apology(user: &str) -> String {
    format!(
        "Sorry, @{user}. I encountered an error while trying to answer your follow-up question."
    )
}

pub fn help_message(user: &str) -> String {
    format!(
        "Hi @{user}! 👋 I'm an AI assistant for this repository. Here's how I can help:\n\n\
         - **New discussions**: I read every new discussion and reply with an answer based on the repository's documentation and code.\n\
         - **Follow-up questions**: mention me in a comment on a discussion, followed by your question, and I'll answer it using the original discussion and the repository as context.\n\
         - **Help**: mention me with the word `help` to see this message again.{FOLLOW_UP_ANSWER_SIGNATURE}"
    )
}

pub fn welcome_message(user: &str, owner: &str, repo: &str) -> String {
    format!(
        "Hi @{user}! 👋 Welcome to the `{repo}` repository, and thank you so much for your contribution! 🎉\n\n\
         We really appreciate you taking the time to submit this pull request. A maintainer will review it as soon as possible.\n\n\
         In the meantime, please make sure you've:\n\
         - Read our [CONTRIBUTING.md](https://github.com/{owner}/{repo}/blob/main/CONTRIBUTING.md) guide (if it exists).\n\
         - Added or updated tests for your changes.\n\
         - Updated any relevant documentation.\n\n\
         Thanks again!\n"
    )
}
