//! The requesting side of the channel.
//!
//! A [`Client`] writes one [`Request`] at a time and blocks until the validator has
//! replaced it with a [`Response`].

use std::time::Duration;

use crate::{
    channel::{CancelToken, Channel, ChannelConfig},
    service::{distinct_length, Request, Response},
    Result,
};

/// Client end of a validator channel.
#[derive(Debug)]
pub struct Client {
    channel: Channel,
    timeout: Option<Duration>,
}

impl Client {
    /// Open the channel described by `config`.
    ///
    /// Opening truncates the shared file, so the validator must already be up.
    ///
    /// # Errors
    /// Returns [`crate::ChannelError::Open`] if the shared file cannot be opened.
    pub fn connect(config: &ChannelConfig) -> Result<Self> {
        Ok(Client {
            channel: Channel::open(config)?,
            timeout: config.timeout,
        })
    }

    /// Send `request` and wait for the validator's answer.
    ///
    /// The client can be reused for any number of sequential requests.
    ///
    /// # Errors
    /// Returns [`crate::ChannelError::TimedOut`] if no answer arrives within the configured
    /// timeout, [`crate::ChannelError::Cancelled`] if `cancel` fires, or a channel I/O error.
    pub fn check(&self, request: &Request, cancel: &CancelToken) -> Result<Response> {
        // The channel still holds the previous response
        let payload = distinct_length(request.encode(), self.channel.len()?);
        self.channel.write(payload.as_bytes())?;
        log::debug!(
            "Sent {} path(s), waiting on {}",
            request.paths.len(),
            self.channel.path().display()
        );

        self.channel
            .wait_for_change(payload.len() as u64, true, self.timeout, cancel)?;
        Ok(Response::decode(&self.channel.read()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ChannelError, Error};

    #[test]
    fn test_times_out_without_validator() {
        let dir = tempfile::tempdir().unwrap();
        let config = ChannelConfig::default()
            .with_path(dir.path().join("lonely.pipe"))
            .with_poll_interval(Duration::from_millis(1))
            .with_timeout(Duration::from_millis(30));

        let client = Client::connect(&config).unwrap();
        let result = client.check(&Request::new("/proj", ["a.txt"]), &CancelToken::new());
        assert!(matches!(
            result,
            Err(Error::Channel(ChannelError::TimedOut(_)))
        ));
    }

    #[test]
    fn test_reads_peer_answer() {
        let dir = tempfile::tempdir().unwrap();
        let config = ChannelConfig::default()
            .with_path(dir.path().join("peer.pipe"))
            .with_poll_interval(Duration::from_millis(1));
        let client = Client::connect(&config).unwrap();

        let peer_config = config.clone();
        let peer = std::thread::spawn(move || {
            let channel = Channel::create(&peer_config).unwrap();
            let len = channel
                .wait_for_change(0, true, Some(Duration::from_secs(10)), &CancelToken::new())
                .unwrap();
            assert_eq!(channel.read().unwrap().len() as u64, len);
            channel.write(b"success\n").unwrap();
        });

        // The peer truncates on create; give it time to get there first
        std::thread::sleep(Duration::from_millis(50));
        let response = client
            .check(&Request::new("/proj", ["a.txt"]), &CancelToken::new())
            .unwrap();
        peer.join().unwrap();
        assert!(response.is_success());
    }

    #[test]
    fn test_request_padded_past_previous_response() {
        let dir = tempfile::tempdir().unwrap();
        let config = ChannelConfig::default()
            .with_path(dir.path().join("reuse.pipe"))
            .with_poll_interval(Duration::from_millis(1))
            .with_timeout(Duration::from_secs(10));
        let client = Client::connect(&config).unwrap();
        let request = Request::new("/proj", ["a.txt"]);

        // An earlier response exactly as long as the next request
        let peer = Channel::open(&config).unwrap();
        let previous = "x".repeat(request.encode().len());
        peer.write(previous.as_bytes()).unwrap();

        let expected = request.clone();
        let observed = previous.len() as u64;
        let answer = std::thread::spawn(move || {
            let len = peer
                .wait_for_change(observed, true, Some(Duration::from_secs(10)), &CancelToken::new())
                .unwrap();
            assert_eq!(len, observed + 1);
            assert_eq!(Request::decode(&peer.read().unwrap()).unwrap(), expected);
            peer.write(b"success\n").unwrap();
        });

        let response = client.check(&request, &CancelToken::new()).unwrap();
        answer.join().unwrap();
        assert!(response.is_success());
    }
}
