//! Link rendering and filtering

use serde::Serialize;
use tracing::{debug, warn};

use crate::renderer::{render_without_includes, Variables};
use crate::template::Link;

/// A link ready to show next to a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedLink {
    pub name: String,
    pub url: String,
}

/// Render links against `vars`, keeping the ones that should be shown
///
/// A link flagged `skip_if_unresolved` is dropped when its name or url used a
/// placeholder without a value. Only placeholders that are actually rendered
/// count: one inside a conditional branch that is not taken does not drop the
/// link, so `{% if pr nonempty %}...{pr}{% endif %}` marks `pr` as optional.
/// Links are also filtered by `show_active` /
/// `show_inactive` for the session's current state. Never fails: a link that
/// does not render is dropped with a warning.
pub fn resolve_links(links: &[Link], vars: &Variables, session_active: bool) -> Vec<RenderedLink> {
    links
        .iter()
        .filter(|link| {
            if session_active {
                link.show_active
            } else {
                link.show_inactive
            }
        })
        .filter_map(|link| resolve_link(link, vars))
        .collect()
}

fn resolve_link(link: &Link, vars: &Variables) -> Option<RenderedLink> {
    let rendered = render_without_includes(&link.name, vars)
        .and_then(|name| render_without_includes(&link.url, vars).map(|url| (name, url)));

    let (name, url) = match rendered {
        Ok(pair) => pair,
        Err(e) => {
            warn!(link = %link.name, error = %e, "dropping link that does not render");
            return None;
        }
    };

    if link.skip_if_unresolved && !(name.is_resolved() && url.is_resolved()) {
        let unresolved = [name.unresolved.as_slice(), url.unresolved.as_slice()].concat();
        debug!(link = %link.name, ?unresolved, "skipping link with unresolved placeholders");
        return None;
    }

    Some(RenderedLink {
        name: name.text,
        url: url.text,
    })
}
