//! Basic example binding Rust functions into a web page.
//!
//! Run with: `cargo run --example basic`

use std::time::Duration;

use webview::{SizeHint, WebviewSession, WebviewSettings};

fn main() -> webview::Result<()> {
    // Initialize tracing for debug output
    tracing_subscriber::fmt::init();

    let html = r#"
<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>webview Example</title>
    <style>
        body {
            font-family: system-ui, sans-serif;
            margin: 0;
            padding: 20px;
            background: linear-gradient(135deg, #667eea 0%, #764ba2 100%);
            min-height: 100vh;
            color: white;
        }
        button {
            background: white;
            color: #764ba2;
            border: none;
            padding: 10px 20px;
            border-radius: 5px;
            cursor: pointer;
            font-size: 16px;
        }
        #response {
            margin-top: 20px;
            padding: 10px;
            background: rgba(0, 0, 0, 0.2);
            border-radius: 5px;
            font-family: monospace;
        }
    </style>
</head>
<body>
    <h1>webview + Rust</h1>
    <button onclick="greetRust()">Greet</button>
    <button onclick="slowRust()">Slow</button>
    <button onclick="failRust()">Fail</button>
    <button onclick="quit()">Quit</button>
    <div id="response"></div>

    <script>
        const show = (label, value) => {
            document.getElementById('response').textContent =
                label + ': ' + JSON.stringify(value, null, 2);
        };

        async function greetRust() {
            show('Response', await greet('webview user'));
        }

        async function slowRust() {
            show('Slow', await slow(500));
        }

        async function failRust() {
            try {
                await fail();
            } catch (e) {
                show('Error', String(e));
            }
        }
    </script>
</body>
</html>
"#;

    let settings = WebviewSettings::new()
        .with_title("webview Example")
        .with_size(640, 480, SizeHint::None)
        .with_html(html)
        .with_debug(true);

    let session = WebviewSession::new(settings)?;

    session.bind("greet", |req| {
        let (name,): (String,) = req.decode()?;
        Ok::<_, webview::Error>(serde_json::json!({
            "greeting": format!("Hello, {name}!"),
            "from": "Rust"
        }))
    })?;

    session.bind_deferred("slow", |req, responder| {
        let delay = req.args().first().and_then(serde_json::Value::as_u64).unwrap_or(0);
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(delay));
            responder.resolve(format!("waited {delay}ms"));
        });
    })?;

    session.bind("fail", |_| Err::<(), _>("this binding always fails"))?;

    let handle = session.handle();
    session.bind("quit", move |_| handle.terminate())?;

    session.run()?;
    session.destroy();
    Ok(())
}
