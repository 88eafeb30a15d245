use url::Url;

use crate::client::Email;
use crate::model::{DuePost, Subscriber};

/// Permalink of a post on the public site
pub fn post_url(site_url: &Url, post: &DuePost) -> Url {
    let mut url = site_url.clone();
    // Only cannot-be-a-base URLs (mailto: and the like) refuse segments
    if let Ok(mut segments) = url.path_segments_mut() {
        segments
            .pop_if_empty()
            .extend(["blog", "posts", &post.id.to_string()]);
    }
    url
}

/// The email a subscriber receives about a newly published post
pub fn post_notification(site_url: &Url, post: &DuePost, subscriber: &Subscriber) -> Email {
    let link = post_url(site_url, post);

    let subject = format!("New blog post: {}", post.title);
    let text_body = format!(
        "Hi {name},\n\nA new blog post has been published: {title}\n\n{subtitle}\n\nRead it here:\n{link}\n",
        name = subscriber.name,
        title = post.title,
        subtitle = post.subtitle,
        link = link,
    );
    let html_body = format!(
        "<p>Hi {name},</p><p>A new blog post has been published: <strong>{title}</strong></p><p>{subtitle}</p><p><a href=\"{link}\">Read it here</a></p>",
        name = escape_html(&subscriber.name),
        title = escape_html(&post.title),
        subtitle = escape_html(&post.subtitle),
        link = link,
    );

    Email {
        subject,
        html_body,
        text_body,
    }
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}
