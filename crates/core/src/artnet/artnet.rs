use std::net::{SocketAddr, UdpSocket};

use artnet_protocol::{ArtCommand, Output, PortAddress};

use super::network_config::NetworkConfig;
use crate::dmx::channel_buffer::DMX_CHANNELS;
use crate::dmx::scene::DmxUniverse;
use crate::error::TransportError;
use crate::modules::traits::DmxTransport;

#[derive(Clone, Debug, PartialEq)]
pub enum ArtNetMode {
    Broadcast,
    /// (source, destination)
    Unicast(SocketAddr, SocketAddr),
}

/// Art-Net 4 output. One socket per destination, universes routed by
/// [`NetworkConfig`].
pub struct ArtNet {
    config: NetworkConfig,
    sockets: Vec<(UdpSocket, SocketAddr)>,
}

fn open_socket(mode: &ArtNetMode, port: u16) -> Result<(UdpSocket, SocketAddr), TransportError> {
    match mode {
        ArtNetMode::Broadcast => {
            let socket = UdpSocket::bind(("0.0.0.0", 0))?;
            socket.set_broadcast(true)?;
            Ok((socket, SocketAddr::from(([255, 255, 255, 255], port))))
        }
        ArtNetMode::Unicast(source, destination) => {
            let socket = UdpSocket::bind(SocketAddr::new(source.ip(), 0))?;
            Ok((socket, *destination))
        }
    }
}

impl ArtNet {
    pub fn new(config: NetworkConfig) -> Result<Self, TransportError> {
        let sockets = config
            .destinations
            .iter()
            .map(|destination| open_socket(&destination.mode, config.port))
            .collect::<Result<Vec<_>, _>>()?;
        log::info!("Art-Net output: {}", config.describe());
        Ok(Self { config, sockets })
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }
}

/// ArtDmx packet for a 1-based `universe`. Art-Net port addresses are
/// 0-based.
pub fn dmx_packet(universe: u16, frame: &[u8; DMX_CHANNELS]) -> Result<Vec<u8>, TransportError> {
    let index = universe
        .checked_sub(1)
        .ok_or_else(|| TransportError::Other("universe 0 has no port address".to_string()))?;
    let port_address = PortAddress::try_from(index)
        .map_err(|e| TransportError::Other(format!("universe {}: {:?}", universe, e)))?;
    let command = ArtCommand::Output(Output {
        data: frame.to_vec().into(),
        port_address,
        ..Output::default()
    });
    command
        .write_to_buffer()
        .map_err(|e| TransportError::Other(format!("{:?}", e)))
}

impl DmxTransport for ArtNet {
    fn send(&mut self, universe: u16, frame: &[u8; DMX_CHANNELS]) -> Result<(), TransportError> {
        let Some(index) = self.config.destination_for_universe(universe) else {
            // unrouted universes have nowhere to go
            return Ok(());
        };
        let (socket, target) = self
            .sockets
            .get(index)
            .ok_or_else(|| TransportError::NotConnected(format!("destination {}", index)))?;
        let bytes = dmx_packet(universe, frame)?;
        socket.send_to(&bytes, target)?;
        Ok(())
    }

    fn connect(&mut self, universe: &DmxUniverse) -> Result<(), TransportError> {
        let number = universe.universe_number;
        if self.config.destination_for_universe(number).is_none() {
            if self.config.destinations.is_empty() {
                return Err(TransportError::NotConnected(format!("universe {}", number)));
            }
            log::info!("Routing universe {} to the first Art-Net destination", number);
            self.config.route_universe(number, 0);
        }
        Ok(())
    }

    fn disconnect(&mut self, universe: u16) -> Result<(), TransportError> {
        log::debug!("Universe {} no longer sent", universe);
        Ok(())
    }
}
