//! Web UI shells for the driven pages.
//!
//! The service renders no page layout of its own. Each shell loads the
//! page's view model from `/display/{page}` and refreshes a region whenever
//! a `RegionUpdated` event for it arrives on `/events`. Real screens style
//! the same data with their own templates.

use axum::{
    extract::State,
    response::{Html, IntoResponse},
};

use crate::api::AppState;
use crate::bus::PageKind;
use crate::config::PagesConfig;

/// HTML document wrapper with Pico CSS
fn html_doc(title: &str, nav_active: &str, pages: &PagesConfig, content: &str) -> String {
    let nav = nav_html(nav_active, pages);
    let version = env!("CARGO_PKG_VERSION");
    format!(
        r#"<!DOCTYPE html>
<html lang="en" data-theme="dark">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{title} - Amelie Narrowcast</title>
    <link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/@picocss/pico@2/css/pico.min.css">
    <style>
        :root {{ --pico-font-size: 15px; }}
        .region-grid {{ display: grid; grid-template-columns: repeat(auto-fill, minmax(320px, 1fr)); gap: 1rem; }}
        .region pre {{ white-space: pre-wrap; word-break: break-word; margin: 0; }}
        .status-ok {{ color: var(--pico-ins-color); }}
        .status-err {{ color: var(--pico-del-color); }}
        small {{ color: var(--pico-muted-color); }}
    </style>
</head>
<body>
    <header class="container">
        {nav}
    </header>
    <main class="container">
        {content}
    </main>
    <footer class="container">
        <small>Amelie Narrowcast v{version}</small>
    </footer>
</body>
</html>"#
    )
}

fn page_enabled(page: PageKind, pages: &PagesConfig) -> bool {
    match page {
        PageKind::Narrowcast => pages.narrowcast,
        PageKind::Tv => pages.tv,
        PageKind::Room => pages.room,
        PageKind::Pos => pages.pos,
    }
}

fn page_title(page: PageKind) -> &'static str {
    match page {
        PageKind::Narrowcast => "Narrowcasting",
        PageKind::Tv => "TV",
        PageKind::Room => "Room",
        PageKind::Pos => "Point of sale",
    }
}

/// Navigation HTML, listing only the pages this instance drives
fn nav_html(active: &str, pages: &PagesConfig) -> String {
    let items: String = std::iter::once(("status", "Status", "/".to_string()))
        .chain(
            PageKind::ALL
                .iter()
                .filter(|p| page_enabled(**p, pages))
                .map(|p| (p.as_str(), page_title(*p), format!("/{}", p.as_str()))),
        )
        .map(|(id, label, href)| {
            if id == active {
                format!(
                    r#"<li><a href="{href}" aria-current="page"><strong>{label}</strong></a></li>"#
                )
            } else {
                format!(r#"<li><a href="{href}">{label}</a></li>"#)
            }
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"<nav>
        <ul><li><strong>Amelie Narrowcast</strong></li></ul>
        <ul>{items}</ul>
    </nav>"#
    )
}

/// Region cards kept in sync with the display store
fn page_content(page: PageKind) -> String {
    let name = page.as_str();
    let title = page_title(page);
    format!(
        r#"
<h1>{title}</h1>
<div id="regions" class="region-grid" aria-busy="true"></div>
<script>
    const page = '{name}';
    const container = document.getElementById('regions');

    function renderRegion(region, value) {{
        let card = document.getElementById('region-' + region);
        if (!card) {{
            card = document.createElement('article');
            card.id = 'region-' + region;
            card.className = 'region';
            card.innerHTML = '<header><strong></strong></header><pre></pre>';
            card.querySelector('strong').textContent = region;
            container.appendChild(card);
        }}
        card.querySelector('pre').textContent = JSON.stringify(value, null, 2);
    }}

    function load() {{
        fetch('/display/' + page).then(r => r.json()).then(snapshot => {{
            container.removeAttribute('aria-busy');
            Object.keys(snapshot.regions).sort().forEach(region => {{
                renderRegion(region, snapshot.regions[region]);
            }});
        }}).catch(() => {{}});
    }}

    const events = new EventSource('/events');
    events.onmessage = (msg) => {{
        const event = JSON.parse(msg.data);
        if (event.type === 'RegionUpdated' && event.payload.page === page) {{
            load();
        }}
    }};
    load();
</script>
"#
    )
}

async fn page_shell(state: &AppState, page: PageKind) -> Html<String> {
    Html(html_doc(
        page_title(page),
        page.as_str(),
        &state.config.pages,
        &page_content(page),
    ))
}

/// GET / - Status overview
pub async fn index_page(State(state): State<AppState>) -> impl IntoResponse {
    let rows: String = state
        .coordinator
        .task_status()
        .await
        .iter()
        .map(|task| {
            let (class, label) = if task.running {
                ("status-ok", "running")
            } else if task.enabled {
                ("status-err", "stopped")
            } else {
                ("", "disabled")
            };
            format!(
                r#"<tr><td>{name}</td><td class="{class}">{label}</td></tr>"#,
                name = task.name
            )
        })
        .collect();

    let content = format!(
        r#"
<h1>Status</h1>
<table>
    <thead><tr><th>Task</th><th>State</th></tr></thead>
    <tbody>{rows}</tbody>
</table>
"#
    );
    Html(html_doc("Status", "status", &state.config.pages, &content))
}

/// GET /narrowcast
pub async fn narrowcast_page(State(state): State<AppState>) -> impl IntoResponse {
    page_shell(&state, PageKind::Narrowcast).await
}

/// GET /tv
pub async fn tv_page(State(state): State<AppState>) -> impl IntoResponse {
    page_shell(&state, PageKind::Tv).await
}

/// GET /room
pub async fn room_page(State(state): State<AppState>) -> impl IntoResponse {
    page_shell(&state, PageKind::Room).await
}

/// GET /pos
pub async fn pos_page(State(state): State<AppState>) -> impl IntoResponse {
    page_shell(&state, PageKind::Pos).await
}
