use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::manager::ReservationManager;
use crate::model::{LocalDateTime, Reservation};
use crate::store::RecordStore;

/// How dates are typed in and printed.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M";

pub fn parse_datetime(s: &str) -> Option<LocalDateTime> {
    LocalDateTime::parse_from_str(s.trim(), DATETIME_FORMAT).ok()
}

pub fn format_reservation(r: &Reservation) -> String {
    format!(
        "{} | {} -> {} | {}",
        r.resource_id,
        r.start.format(DATETIME_FORMAT),
        r.end.format(DATETIME_FORMAT),
        r.id
    )
}

/// Line-oriented menu over any async reader/writer pair.
///
/// Every prompt loops until it gets a usable answer. End of input at any
/// prompt ends the session.
pub struct Console<'a, S, R, W> {
    manager: &'a ReservationManager<S>,
    rooms: &'a [String],
    input: R,
    output: W,
}

impl<'a, S, R, W> Console<'a, S, R, W>
where
    S: RecordStore,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(
        manager: &'a ReservationManager<S>,
        rooms: &'a [String],
        input: R,
        output: W,
    ) -> Self {
        Self {
            manager,
            rooms,
            input,
            output,
        }
    }

    pub async fn run(&mut self) -> io::Result<()> {
        loop {
            self.say("\n=== Room booking ===").await?;
            self.say("1. Book available room").await?;
            self.say("2. List all bookings").await?;
            self.say("3. List bookings for a room").await?;
            self.say("4. Check availability").await?;
            self.say("0. Exit").await?;

            let Some(choice) = self.read_line("Choice: ").await? else {
                break;
            };
            let done = match choice.as_str() {
                "1" => self.book_available_room().await?,
                "2" => self.list_all().await?,
                "3" => self.list_room().await?,
                "4" => self.check_availability().await?,
                "0" => true,
                _ => {
                    self.say("Invalid choice.").await?;
                    false
                }
            };
            if done {
                break;
            }
        }
        self.say("Goodbye.").await?;
        self.output.flush().await
    }

    async fn say(&mut self, line: &str) -> io::Result<()> {
        self.output.write_all(line.as_bytes()).await?;
        self.output.write_all(b"\n").await
    }

    /// Prompt and return the trimmed line. `None` on end of input.
    async fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        self.output.write_all(prompt.as_bytes()).await?;
        self.output.flush().await?;
        let mut line = String::new();
        if self.input.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    async fn read_required(&mut self, prompt: &str) -> io::Result<Option<String>> {
        loop {
            match self.read_line(prompt).await? {
                Some(s) if s.is_empty() => continue,
                other => return Ok(other),
            }
        }
    }

    async fn read_datetime(&mut self, prompt: &str) -> io::Result<Option<LocalDateTime>> {
        loop {
            let Some(line) = self.read_line(prompt).await? else {
                return Ok(None);
            };
            match parse_datetime(&line) {
                Some(dt) => return Ok(Some(dt)),
                None => self.say("Invalid format. Use: YYYY-MM-DD HH:MM").await?,
            }
        }
    }

    /// A number in `1..=max`.
    async fn read_index(&mut self, prompt: &str, max: usize) -> io::Result<Option<usize>> {
        loop {
            let Some(line) = self.read_line(prompt).await? else {
                return Ok(None);
            };
            match line.parse::<usize>() {
                Ok(n) if (1..=max).contains(&n) => return Ok(Some(n)),
                _ => {
                    self.say(&format!("Invalid value. Enter a number between 1 and {max}."))
                        .await?
                }
            }
        }
    }

    async fn read_interval(&mut self) -> io::Result<Option<(LocalDateTime, LocalDateTime)>> {
        let Some(start) = self.read_datetime("Start (YYYY-MM-DD HH:MM): ").await? else {
            return Ok(None);
        };
        let Some(end) = self.read_datetime("End   (YYYY-MM-DD HH:MM): ").await? else {
            return Ok(None);
        };
        Ok(Some((start, end)))
    }

    /// Ask for a time, offer only the rooms free for all of it, book the pick.
    /// Returns `true` when input ran out.
    async fn book_available_room(&mut self) -> io::Result<bool> {
        let Some((start, end)) = self.read_interval().await? else {
            return Ok(true);
        };

        let free = match self.manager.available_resources(self.rooms, start, end).await {
            Ok(free) => free,
            Err(e) => {
                self.say(&format!("Error: {e}")).await?;
                return Ok(false);
            }
        };
        if free.is_empty() {
            self.say("No available rooms during this time.").await?;
            return Ok(false);
        }

        self.say("Available rooms:").await?;
        for (i, room) in free.iter().enumerate() {
            self.say(&format!("{}. {room}", i + 1)).await?;
        }
        let Some(pick) = self.read_index("Choose room (number): ", free.len()).await? else {
            return Ok(true);
        };
        let room = &free[pick - 1];

        match self.manager.create_reservation(room, start, end).await {
            Ok(id) => self.say(&format!("Booking created! Room: {room}. Id: {id}")).await?,
            Err(e) => {
                debug!("console booking of {room} failed: {e}");
                self.say(&format!("Error: {e}")).await?
            }
        }
        Ok(false)
    }

    async fn print_reservations(
        &mut self,
        heading: &str,
        found: Vec<Reservation>,
    ) -> io::Result<()> {
        if found.is_empty() {
            return self.say("No bookings found.").await;
        }
        self.say(heading).await?;
        for r in &found {
            self.say(&format_reservation(r)).await?;
        }
        Ok(())
    }

    async fn list_all(&mut self) -> io::Result<bool> {
        match self.manager.list_all().await {
            Ok(found) => self.print_reservations("All bookings:", found).await?,
            Err(e) => self.say(&format!("Error: {e}")).await?,
        }
        Ok(false)
    }

    async fn list_room(&mut self) -> io::Result<bool> {
        let Some(room) = self.read_required("Room: ").await? else {
            return Ok(true);
        };
        match self.manager.list_by_resource(&room).await {
            Ok(found) => {
                self.print_reservations(&format!("Bookings for {room}:"), found)
                    .await?
            }
            Err(e) => self.say(&format!("Error: {e}")).await?,
        }
        Ok(false)
    }

    async fn check_availability(&mut self) -> io::Result<bool> {
        let Some(room) = self.read_required("Room: ").await? else {
            return Ok(true);
        };
        let Some((start, end)) = self.read_interval().await? else {
            return Ok(true);
        };
        match self.manager.is_available(&room, start, end).await {
            Ok(true) => self.say(&format!("{room} is available.")).await?,
            Ok(false) => self.say(&format!("{room} is booked during this time.")).await?,
            Err(e) => self.say(&format!("Error: {e}")).await?,
        }
        Ok(false)
    }
}
