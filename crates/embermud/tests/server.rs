//! Integration tests for the Embermud server: greeting, login, and
//! the core in-world commands over a real TCP connection.

use std::time::Duration;

use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use embermud::{Server, ServerConfig};

// =========================================================================
// Helpers
// =========================================================================

/// Starts a server on a random port with a fresh data directory and
/// returns the address. The tempdir must stay alive for the test.
async fn start_server() -> (String, TempDir) {
    let data = TempDir::new().expect("tempdir");
    let config = ServerConfig {
        bind_addr: "127.0.0.1:0".to_owned(),
        data_dir: data.path().to_path_buf(),
    };
    let server = Server::bind(config).await.expect("server should bind");
    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    (addr, data)
}

async fn connect(addr: &str) -> TcpStream {
    TcpStream::connect(addr).await.expect("should connect")
}

async fn send_line(stream: &mut TcpStream, line: &str) {
    stream
        .write_all(format!("{line}\r\n").as_bytes())
        .await
        .expect("send line");
}

/// Reads until the needle appears in the accumulated bytes, returning
/// everything read. Panics after two seconds.
async fn read_until(stream: &mut TcpStream, needle: &str) -> Vec<u8> {
    let mut collected = Vec::new();
    let mut buf = [0u8; 1024];
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        let read = tokio::time::timeout_at(deadline, stream.read(&mut buf))
            .await
            .unwrap_or_else(|_| {
                panic!(
                    "timed out waiting for {needle:?}, got: {:?}",
                    String::from_utf8_lossy(&collected)
                )
            })
            .expect("read");
        assert!(read > 0, "connection closed waiting for {needle:?}");
        collected.extend_from_slice(&buf[..read]);
        if String::from_utf8_lossy(&collected).contains(needle) {
            return collected;
        }
    }
}

fn text_of(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Creates a fresh character and plays through to the first prompt.
async fn login(stream: &mut TcpStream, name: &str) {
    read_until(stream, "By what name").await;
    send_line(stream, name).await;
    read_until(stream, "Give me a password").await;
    send_line(stream, "hunter2").await;
    read_until(stream, "What is your race?").await;
    send_line(stream, "cragkin").await;
    read_until(stream, "Origin: ").await;
    send_line(stream, "1").await;
    read_until(stream, "<HP:").await;
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_greeting_offers_gmcp_and_asks_name() {
    let (addr, _data) = start_server().await;
    let mut stream = connect(&addr).await;

    let greeting = read_until(&mut stream, "By what name").await;
    // IAC DO GMCP goes out before the banner text.
    assert!(
        greeting.windows(3).any(|w| w == [0xFF, 0xFD, 0xC9]),
        "no gmcp offer in greeting"
    );
    assert!(text_of(&greeting).contains("Welcome to Embermud"));
}

#[tokio::test]
async fn test_new_character_login_reaches_world() {
    let (addr, _data) = start_server().await;
    let mut stream = connect(&addr).await;

    read_until(&mut stream, "By what name").await;
    send_line(&mut stream, "Tester").await;
    let reply = read_until(&mut stream, "Give me a password").await;
    assert!(text_of(&reply).contains("New character"));

    send_line(&mut stream, "hunter2").await;
    read_until(&mut stream, "What is your race?").await;
    send_line(&mut stream, "cragkin").await;
    read_until(&mut stream, "Origin: ").await;
    send_line(&mut stream, "1").await;

    let entry = read_until(&mut stream, "<HP:").await;
    let text = text_of(&entry);
    assert!(text.contains("Welcome to Embermud, Tester the Cragkin!"));
    assert!(text.contains("Temple Square"));
    assert!(text.contains("A plain short sword lies here."));
}

#[tokio::test]
async fn test_bad_name_rejected() {
    let (addr, _data) = start_server().await;
    let mut stream = connect(&addr).await;

    read_until(&mut stream, "By what name").await;
    send_line(&mut stream, "x!").await;
    let reply = read_until(&mut stream, "Illegal name").await;
    assert!(text_of(&reply).contains("Illegal name, try another."));
}

#[tokio::test]
async fn test_unknown_command_gets_huh() {
    let (addr, _data) = start_server().await;
    let mut stream = connect(&addr).await;
    login(&mut stream, "Tester").await;

    send_line(&mut stream, "frobnicate").await;
    read_until(&mut stream, "Huh?").await;
}

#[tokio::test]
async fn test_move_north_shows_next_room() {
    let (addr, _data) = start_server().await;
    let mut stream = connect(&addr).await;
    login(&mut stream, "Tester").await;

    send_line(&mut stream, "north").await;
    let reply = read_until(&mut stream, "North Road").await;
    let text = text_of(&reply);
    assert!(text.contains("A city guard leans on a spear"));
    assert!(text.contains("[Exits: south]"));
}

#[tokio::test]
async fn test_move_into_missing_exit_denied() {
    let (addr, _data) = start_server().await;
    let mut stream = connect(&addr).await;
    login(&mut stream, "Tester").await;

    send_line(&mut stream, "east").await;
    read_until(&mut stream, "Alas, you cannot go that way.").await;
}

#[tokio::test]
async fn test_get_and_drop_sword() {
    let (addr, _data) = start_server().await;
    let mut stream = connect(&addr).await;
    login(&mut stream, "Tester").await;

    send_line(&mut stream, "get sword").await;
    read_until(&mut stream, "You pick up a short sword.").await;

    send_line(&mut stream, "drop sword").await;
    read_until(&mut stream, "You drop a short sword.").await;
}

#[tokio::test]
async fn test_say_reaches_other_player() {
    let (addr, _data) = start_server().await;
    let mut speaker = connect(&addr).await;
    let mut listener = connect(&addr).await;
    login(&mut speaker, "Speaker").await;
    login(&mut listener, "Listener").await;

    send_line(&mut speaker, "say hail and well met").await;
    let own = read_until(&mut speaker, "You say 'hail and well met'").await;
    assert!(text_of(&own).contains("You say"));
    read_until(&mut listener, "Speaker says 'hail and well met'").await;
}

#[tokio::test]
async fn test_quit_says_goodbye_and_closes() {
    let (addr, _data) = start_server().await;
    let mut stream = connect(&addr).await;
    login(&mut stream, "Tester").await;

    send_line(&mut stream, "quit").await;
    read_until(&mut stream, "Goodbye.").await;

    // The server closes the socket after the farewell flush.
    let mut buf = [0u8; 64];
    let end = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match stream.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
        }
    })
    .await;
    assert!(end.is_ok(), "connection stayed open after quit");
}

#[tokio::test]
async fn test_character_persists_across_reconnect() {
    let (addr, _data) = start_server().await;
    let mut first = connect(&addr).await;
    login(&mut first, "Keeper").await;
    send_line(&mut first, "quit").await;
    read_until(&mut first, "Goodbye.").await;
    drop(first);

    let mut second = connect(&addr).await;
    read_until(&mut second, "By what name").await;
    send_line(&mut second, "Keeper").await;
    let reply = read_until(&mut second, "Password: ").await;
    assert!(
        !text_of(&reply).contains("New character"),
        "saved character treated as new"
    );
    send_line(&mut second, "hunter2").await;
    let entry = read_until(&mut second, "<HP:").await;
    assert!(text_of(&entry).contains("Welcome back, Keeper."));
}

#[tokio::test]
async fn test_wrong_password_restarts_login() {
    let (addr, _data) = start_server().await;
    let mut first = connect(&addr).await;
    login(&mut first, "Keeper").await;
    send_line(&mut first, "quit").await;
    read_until(&mut first, "Goodbye.").await;
    drop(first);

    let mut second = connect(&addr).await;
    read_until(&mut second, "By what name").await;
    send_line(&mut second, "Keeper").await;
    read_until(&mut second, "Password: ").await;
    send_line(&mut second, "wrong").await;
    let reply = read_until(&mut second, "By what name").await;
    assert!(text_of(&reply).contains("Wrong password."));
}

#[tokio::test]
async fn test_duplicate_login_takes_over_session() {
    let (addr, _data) = start_server().await;
    let mut first = connect(&addr).await;
    login(&mut first, "Walker").await;

    let mut second = connect(&addr).await;
    read_until(&mut second, "By what name").await;
    send_line(&mut second, "Walker").await;
    let reply = read_until(&mut second, "Password: ").await;
    assert!(text_of(&reply).contains("That character is already playing."));
    send_line(&mut second, "hunter2").await;
    read_until(&mut second, "Take over that connection?").await;
    send_line(&mut second, "y").await;
    read_until(&mut second, "Temple Square").await;

    // The old connection is told and then dropped.
    read_until(&mut first, "Reconnected from another location.").await;
}

#[tokio::test]
async fn test_kill_starts_combat() {
    let (addr, _data) = start_server().await;
    let mut stream = connect(&addr).await;
    login(&mut stream, "Fighter").await;

    send_line(&mut stream, "north").await;
    read_until(&mut stream, "North Road").await;
    send_line(&mut stream, "kill guard").await;
    read_until(&mut stream, "the city guard").await;

    // Movement is refused mid-fight.
    send_line(&mut stream, "south").await;
    read_until(&mut stream, "No way! You are still fighting!").await;
}

#[tokio::test]
async fn test_rest_blocks_movement() {
    let (addr, _data) = start_server().await;
    let mut stream = connect(&addr).await;
    login(&mut stream, "Rester").await;

    send_line(&mut stream, "rest").await;
    read_until(&mut stream, "You sit down and rest.").await;
    send_line(&mut stream, "north").await;
    read_until(&mut stream, "You'd better stand up first.").await;
    send_line(&mut stream, "stand").await;
    read_until(&mut stream, "You stand up.").await;
}

#[tokio::test]
async fn test_sleep_silences_commands() {
    let (addr, _data) = start_server().await;
    let mut stream = connect(&addr).await;
    login(&mut stream, "Sleeper").await;

    send_line(&mut stream, "sleep").await;
    read_until(&mut stream, "You go to sleep.").await;
    send_line(&mut stream, "say anyone awake").await;
    read_until(&mut stream, "In your dreams, or what?").await;
    send_line(&mut stream, "wake").await;
    read_until(&mut stream, "You stand up.").await;
}
