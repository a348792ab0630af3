use std::io::{self, BufRead};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use curio_cabinet::board::{TabletopView, TABLETOP_SIZE};
use curio_cabinet::cards::{CardKind, CellPos};
use curio_cabinet::client::ClientConnection;
use curio_cabinet::error::{ClientError, ServiceError};
use curio_cabinet::event::{
    ChatRecipient, PauseReason, ResponseValue, ServiceRequest, SessionEvent,
};
use curio_cabinet::heartbeat::DEFAULT_LIVENESS_TIMEOUT;
use curio_cabinet::shelf::{Shelf, SHELF_COLS, SHELF_ROWS};

pub struct ClientConfig {
    pub server_address: String,
    pub player_name: String,
}

const CALL_TIMEOUT: Duration = Duration::from_secs(10);

const HELP: &str = "\
Commands:
  lobbies                  list open lobbies
  create <name>            create a lobby and become its host
  join <name>              join a lobby
  leave                    leave the current lobby
  lobby                    show the current lobby
  start                    start the game (host only)
  load                     restore the saved game (host only)
  pick <col> <r,c> ...     take 1-3 cards and stack them into a shelf column
  say <message>            message the whole lobby
  whisper <player> <msg>   message one player
  help                     show this message
  quit                     exit";

enum Command {
    Nothing,
    Help,
    Quit,
    Request(ServiceRequest),
}

pub fn run(config: ClientConfig) -> io::Result<()> {
    let connection =
        ClientConnection::connect(config.server_address.as_str()).map_err(into_io_error)?;
    connection.spawn_heartbeat(DEFAULT_LIVENESS_TIMEOUT);

    let event_source = Arc::clone(&connection);
    thread::spawn(move || {
        while let Some(event) = event_source.events().wait(None) {
            print_event(&event);
        }
        println!("Connection closed by the server.");
        std::process::exit(0);
    });

    let reply = connection
        .call(
            ServiceRequest::Login { username: config.player_name.clone() },
            Some(CALL_TIMEOUT),
        )
        .map_err(into_io_error)?;
    print_reply(&reply);
    if reply.is_err() {
        return Ok(());
    }

    println!("{HELP}");
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        match parse_command(&line) {
            Ok(Command::Nothing) => {}
            Ok(Command::Help) => println!("{HELP}"),
            Ok(Command::Quit) => break,
            Ok(Command::Request(request)) => {
                match connection.call(request, Some(CALL_TIMEOUT)) {
                    Ok(reply) => print_reply(&reply),
                    Err(ClientError::Timeout) => {
                        println!("The server did not reply in time.");
                    }
                    Err(err) => {
                        println!("Connection lost: {err:?}");
                        break;
                    }
                }
            }
            Err(message) => println!("{message}"),
        }
    }
    connection.shutdown();
    Ok(())
}

fn parse_command(line: &str) -> Result<Command, String> {
    let mut tokens = line.split_whitespace();
    let Some(verb) = tokens.next() else {
        return Ok(Command::Nothing);
    };
    let rest: Vec<&str> = tokens.collect();
    let request = match verb {
        "help" => return Ok(Command::Help),
        "quit" | "exit" => return Ok(Command::Quit),
        "lobbies" => ServiceRequest::LobbyList,
        "create" => ServiceRequest::LobbyCreate { name: one_arg(&rest, "create <name>")? },
        "join" => ServiceRequest::LobbyJoin { name: one_arg(&rest, "join <name>")? },
        "leave" => ServiceRequest::LobbyLeave,
        "lobby" => ServiceRequest::LobbyUpdate,
        "start" => ServiceRequest::GameStart,
        "load" => ServiceRequest::GameLoad,
        "pick" => {
            let [column, cells @ ..] = rest.as_slice() else {
                return Err("Usage: pick <col> <r,c> ...".to_owned());
            };
            let column: u8 =
                column.parse().map_err(|_| format!("Bad column: {column}"))?;
            let positions = cells
                .iter()
                .map(|cell| parse_cell(cell))
                .collect::<Result<Vec<_>, _>>()?;
            ServiceRequest::CardSelect { column, positions }
        }
        "say" => ServiceRequest::ChatSend {
            message: rest.join(" "),
            recipient: ChatRecipient::All,
        },
        "whisper" => {
            let [target, words @ ..] = rest.as_slice() else {
                return Err("Usage: whisper <player> <message>".to_owned());
            };
            ServiceRequest::ChatSend {
                message: words.join(" "),
                recipient: ChatRecipient::Direct((*target).to_owned()),
            }
        }
        _ => return Err(format!("Unknown command: {verb}. Try `help`.")),
    };
    Ok(Command::Request(request))
}

fn one_arg(rest: &[&str], usage: &str) -> Result<String, String> {
    match rest {
        [arg] => Ok((*arg).to_owned()),
        _ => Err(format!("Usage: {usage}")),
    }
}

fn parse_cell(cell: &str) -> Result<CellPos, String> {
    let parts: Vec<&str> = cell.split(',').collect();
    let [row, col] = parts.as_slice() else {
        return Err(format!("Bad cell (expected r,c): {cell}"));
    };
    let row: u8 = row.parse().map_err(|_| format!("Bad row: {row}"))?;
    let col: u8 = col.parse().map_err(|_| format!("Bad column: {col}"))?;
    Ok(CellPos::new(row, col))
}

fn print_reply(reply: &Result<ResponseValue, ServiceError>) {
    match reply {
        Ok(ResponseValue::Ok) => println!("Ok."),
        Ok(ResponseValue::Welcome { username, rejoined }) => {
            if *rejoined {
                println!("Welcome back, {username}!");
            } else {
                println!("Welcome, {username}!");
            }
        }
        Ok(ResponseValue::Lobbies(lobbies)) => {
            if lobbies.is_empty() {
                println!("No open lobbies.");
            }
            for lobby in lobbies {
                println!("  {} ({}/{})", lobby.name, lobby.num_players, lobby.capacity);
            }
        }
        Ok(ResponseValue::Lobby(lobby)) => {
            println!("Lobby {}: {}", lobby.name, lobby.players.join(", "));
        }
        Err(err) => println!("Request failed: {err:?}"),
    }
}

fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::Join { username } => println!("{username} joined the lobby."),
        SessionEvent::Leave { username } => println!("{username} left the lobby."),
        SessionEvent::Pause { reason: PauseReason::PlayerDisconnected { username } } => {
            println!("Game paused: waiting for {username} to come back.");
        }
        SessionEvent::Resume => println!("Game resumed."),
        SessionEvent::Start(snapshot) => {
            println!("The game is on! Turn order: {}.", snapshot.players.join(", "));
            for objective in &snapshot.common_objectives {
                println!(
                    "Common objective: {} ({} points)",
                    objective.kind.name(),
                    objective.current_points
                );
            }
            println!("{}", render_tabletop(&snapshot.tabletop));
            println!("{} plays first.", snapshot.current_player);
        }
        SessionEvent::Update(update) => {
            println!("{} made a move.", update.mover);
            println!("{}", render_tabletop(&update.tabletop));
            println!("{}'s shelf:\n{}", update.mover, render_shelf(&update.shelf));
            for award in &update.completed {
                println!(
                    "{} earned {} (+{} points)",
                    award.username, award.cockade.name, award.cockade.points
                );
            }
            match &update.next_player {
                Some(next) => println!("Next to play: {next}."),
                None => println!("The round is over."),
            }
        }
        SessionEvent::End { scoreboard } => {
            println!("Game over!");
            for (rank, row) in scoreboard.rows.iter().enumerate() {
                println!(
                    "  {}. {} - {} points ({})",
                    rank + 1,
                    row.username,
                    row.total,
                    row.title
                );
            }
        }
        SessionEvent::NewMessage(message) => {
            match &message.recipient {
                ChatRecipient::All => println!("[{}] {}", message.sender, message.text),
                ChatRecipient::Direct(_) => {
                    println!("[{} whispers] {}", message.sender, message.text);
                }
            }
        }
        SessionEvent::Error { message } => println!("Server: {message}"),
    }
}

fn kind_char(kind: CardKind) -> char {
    match kind {
        CardKind::Books => 'B',
        CardKind::Candles => 'C',
        CardKind::Ferns => 'F',
        CardKind::Figurines => 'G',
        CardKind::Seashells => 'S',
        CardKind::Teacups => 'T',
    }
}

fn render_tabletop(tabletop: &TabletopView) -> String {
    let size = TABLETOP_SIZE as usize;
    let mut out = String::new();
    for row in 0..size {
        for col in 0..size {
            out.push(match tabletop.cells[row * size + col] {
                Some(kind) => kind_char(kind),
                None => '.',
            });
            out.push(' ');
        }
        out.push('\n');
    }
    out
}

fn render_shelf(shelf: &Shelf) -> String {
    let mut out = String::new();
    for row in (0..SHELF_ROWS).rev() {
        for col in 0..SHELF_COLS {
            out.push(match shelf.card_at(row, col) {
                Some(kind) => kind_char(kind),
                None => '.',
            });
            out.push(' ');
        }
        out.push('\n');
    }
    out
}

fn into_io_error(err: ClientError) -> io::Error {
    io::Error::other(format!("{err:?}"))
}
