//! End-to-end tests over real TCP sockets using the line transport

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_util::codec::{Framed, LinesCodec};

use chat_relay::command::HELP;
use chat_relay::connection::Limits;
use chat_relay::hub::Hub;
use chat_relay::line;

const WAIT: Duration = Duration::from_secs(5);

async fn start_server() -> SocketAddr {
    let hub = Hub::spawn("general", 64);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(line::listen(listener, hub, Limits::default()));
    addr
}

struct Client {
    lines: Framed<TcpStream, LinesCodec>,
}

impl Client {
    async fn open(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let mut client = Self {
            lines: Framed::new(stream, LinesCodec::new()),
        };
        assert_eq!(
            client.recv().await,
            "(chatbot): Please enter your username:"
        );
        client
    }

    /// Connect and wait until the join notice for `name` arrives
    async fn join(addr: SocketAddr, name: &str) -> Self {
        let mut client = Self::open(addr).await;
        client.send(name).await;
        client
            .recv_until(&format!("(chatbot): {} has joined general", name))
            .await;
        client
    }

    async fn send(&mut self, line: &str) {
        self.lines.send(line.to_string()).await.unwrap();
    }

    async fn recv(&mut self) -> String {
        timeout(WAIT, self.lines.next())
            .await
            .expect("timed out waiting for a line")
            .expect("connection closed")
            .unwrap()
    }

    /// Read until `expected`, returning the lines skipped on the way
    async fn recv_until(&mut self, expected: &str) -> Vec<String> {
        let mut skipped = Vec::new();
        loop {
            let line = self.recv().await;
            if line == expected {
                return skipped;
            }
            skipped.push(line);
        }
    }

    async fn expect_closed(&mut self) {
        let next = timeout(WAIT, self.lines.next())
            .await
            .expect("timed out waiting for close");
        assert!(next.is_none(), "expected EOF, got {:?}", next);
    }
}

#[tokio::test]
async fn test_mute_round_trip_between_two_clients() {
    let addr = start_server().await;
    let mut alice = Client::join(addr, "alice").await;
    let mut bob = Client::join(addr, "bob").await;
    alice.recv_until("(chatbot): bob has joined general").await;

    bob.send("hi").await;
    assert_eq!(alice.recv().await, "[general] (bob): hi");
    assert_eq!(bob.recv().await, "[general] (bob): hi");

    alice.send("/mute bob").await;
    assert_eq!(
        alice.recv().await,
        "(chatbot): Muted bob. You won't see their messages."
    );

    bob.send("hey").await;
    assert_eq!(bob.recv().await, "[general] (bob): hey");
    // The hub has handled "hey" already, so anything alice would get from it
    // is queued ahead of this reply
    alice.send("/listrooms").await;
    assert_eq!(alice.recv().await, "(chatbot): Rooms: general");

    alice.send("/unmute bob").await;
    assert_eq!(alice.recv().await, "(chatbot): Unmuted bob.");

    bob.send("hey").await;
    assert_eq!(alice.recv().await, "[general] (bob): hey");
}

#[tokio::test]
async fn test_help_is_sent_verbatim() {
    let addr = start_server().await;
    let mut alice = Client::join(addr, "alice").await;

    alice.send("/help").await;
    let mut received = Vec::new();
    for _ in 0..HELP.lines().count() {
        received.push(alice.recv().await);
    }
    assert_eq!(received.join("\n"), format!("(chatbot): {}", HELP));
}

#[tokio::test]
async fn test_welcome_then_join_notice() {
    let addr = start_server().await;
    let mut alice = Client::open(addr).await;
    alice.send("  alice  ").await;

    assert_eq!(
        alice.recv().await,
        "(chatbot): Hello alice, welcome to the chat room"
    );
    let skipped = alice.recv_until("(chatbot): alice has joined general").await;
    assert_eq!(skipped.len(), HELP.lines().count());
}

#[tokio::test]
async fn test_taken_name_is_asked_again() {
    let addr = start_server().await;
    let _alice = Client::join(addr, "alice").await;

    let mut other = Client::open(addr).await;
    other.send("alice").await;
    assert_eq!(
        other.recv().await,
        "(chatbot): Sorry, the name alice is already taken. Please choose another one:"
    );
    other.send("").await;
    assert_eq!(other.recv().await, "(chatbot): Please enter your username:");
    other.send("chatbot").await;
    assert_eq!(
        other.recv().await,
        "(chatbot): Sorry, the name chatbot is already taken. Please choose another one:"
    );
    other.send("alice2").await;
    other
        .recv_until("(chatbot): alice2 has joined general")
        .await;
}

#[tokio::test]
async fn test_channels_and_duplicate_create() {
    let addr = start_server().await;
    let mut alice = Client::join(addr, "alice").await;
    let mut bob = Client::join(addr, "bob").await;

    alice.recv_until("(chatbot): bob has joined general").await;

    alice.send("/newroom random").await;
    assert_eq!(alice.recv().await, "(chatbot): alice has joined random");

    // Creating an existing room joins it
    bob.send("/newroom random").await;
    bob.recv_until("(chatbot): bob has joined random").await;
    alice.recv_until("(chatbot): bob has joined random").await;

    // Joining twice keeps a single membership
    bob.send("/join random").await;
    assert_eq!(
        bob.recv().await,
        "(chatbot): You're already in random. It is now your current channel."
    );
    bob.send("/listusers random").await;
    assert_eq!(bob.recv().await, "(chatbot): Users in random: alice, bob");

    // Plain text goes to the current channel
    bob.send("in random").await;
    assert_eq!(alice.recv().await, "[random] (bob): in random");
    assert_eq!(bob.recv().await, "[random] (bob): in random");

    bob.send("/leave random").await;
    assert_eq!(
        bob.recv().await,
        "(chatbot): Left channel random. Returning you to the general channel."
    );
    assert_eq!(alice.recv().await, "(chatbot): bob has left random");

    bob.send("/leave general").await;
    bob.send("/join nowhere").await;
    assert_eq!(
        bob.recv().await,
        "(chatbot): You can't leave the default channel (which is general)."
    );
    assert_eq!(
        bob.recv().await,
        "(chatbot): Sorry, the channel nowhere doesn't exist."
    );

    bob.send("/listrooms").await;
    assert_eq!(bob.recv().await, "(chatbot): Rooms: general, random");
}

#[tokio::test]
async fn test_direct_message_reaches_only_the_recipient() {
    let addr = start_server().await;
    let mut alice = Client::join(addr, "alice").await;
    let mut bob = Client::join(addr, "bob").await;
    let mut carol = Client::join(addr, "carol").await;

    alice.send("/dm bob:psst").await;
    assert_eq!(bob.recv_until("(dm alice -> bob): psst").await.len(), 1);
    alice.recv_until("(dm alice -> bob): psst").await;

    carol.send("/listrooms").await;
    assert_eq!(carol.recv().await, "(chatbot): Rooms: general");

    alice.send("/dm dave:hello").await;
    alice
        .recv_until("(chatbot): Sorry, the user dave doesn't exist.")
        .await;
}

#[tokio::test]
async fn test_quit_frees_the_name() {
    let addr = start_server().await;
    let mut alice = Client::join(addr, "alice").await;
    let mut bob = Client::join(addr, "bob").await;
    alice.recv_until("(chatbot): bob has joined general").await;

    bob.send("/quit").await;
    bob.recv_until("(chatbot): Goodbye!").await;
    bob.expect_closed().await;
    assert_eq!(alice.recv().await, "(chatbot): bob left the chat");

    alice.send("/listusers").await;
    assert_eq!(alice.recv().await, "(chatbot): Users online: alice");

    let _bob_again = Client::join(addr, "bob").await;
    assert_eq!(alice.recv().await, "(chatbot): bob has joined general");
}

#[tokio::test]
async fn test_dropped_socket_counts_as_departure() {
    let addr = start_server().await;
    let mut alice = Client::join(addr, "alice").await;
    let bob = Client::join(addr, "bob").await;
    alice.recv_until("(chatbot): bob has joined general").await;

    drop(bob);
    assert_eq!(alice.recv().await, "(chatbot): bob left the chat");
}

#[tokio::test]
async fn test_unknown_command_keeps_connection() {
    let addr = start_server().await;
    let mut alice = Client::join(addr, "alice").await;

    alice.send("/dance").await;
    assert_eq!(
        alice.recv().await,
        "(chatbot): /dance isn't a command. Type /help to see available commands"
    );
    alice.send("/mute alice").await;
    assert_eq!(alice.recv().await, "(chatbot): You can't mute yourself.");
    alice.send("still here").await;
    assert_eq!(alice.recv().await, "[general] (alice): still here");
}
