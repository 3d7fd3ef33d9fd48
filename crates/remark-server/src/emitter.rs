use tokio::sync::mpsc;

use remark_core::protocol::StreamEvent;

/// Serializes loop progress into the outbound event protocol.
///
/// State machine: Idle → Open → Closed. `open` must come first and
/// emits `connected` before any model work; exactly one of
/// `complete`/`fail` closes the stream; anything after closure is
/// rejected. A send on a dropped receiver means the client hung up.
pub struct StreamEmitter {
    tx: mpsc::Sender<StreamEvent>,
    state: State,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Idle,
    Open,
    Closed,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum EmitterError {
    #[error("stream not opened")]
    NotOpen,
    #[error("stream already opened")]
    AlreadyOpen,
    #[error("stream already closed")]
    Closed,
    #[error("client disconnected")]
    Disconnected,
}

impl StreamEmitter {
    pub fn new(tx: mpsc::Sender<StreamEvent>) -> Self {
        Self {
            tx,
            state: State::Idle,
        }
    }

    pub async fn open(&mut self) -> Result<(), EmitterError> {
        match self.state {
            State::Idle => {}
            State::Open => return Err(EmitterError::AlreadyOpen),
            State::Closed => return Err(EmitterError::Closed),
        }
        self.send(StreamEvent::Connected).await?;
        self.state = State::Open;
        Ok(())
    }

    pub async fn chunk(&mut self, content: String) -> Result<(), EmitterError> {
        self.require_open()?;
        self.send(StreamEvent::Chunk { content }).await
    }

    pub async fn complete(&mut self) -> Result<(), EmitterError> {
        self.require_open()?;
        self.send(StreamEvent::Done).await?;
        self.state = State::Closed;
        Ok(())
    }

    pub async fn fail(&mut self, message: String) -> Result<(), EmitterError> {
        self.require_open()?;
        self.send(StreamEvent::Error { message }).await?;
        self.state = State::Closed;
        Ok(())
    }

    fn require_open(&self) -> Result<(), EmitterError> {
        match self.state {
            State::Open => Ok(()),
            State::Idle => Err(EmitterError::NotOpen),
            State::Closed => Err(EmitterError::Closed),
        }
    }

    async fn send(&mut self, event: StreamEvent) -> Result<(), EmitterError> {
        if self.tx.send(event).await.is_err() {
            // Receiver dropped: response body is gone, nothing more
            // can ever be delivered.
            self.state = State::Closed;
            return Err(EmitterError::Disconnected);
        }
        Ok(())
    }
}
