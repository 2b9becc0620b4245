use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};

use super::artnet::ArtNetMode;

#[derive(Clone, Debug)]
pub struct NetworkConfig {
    pub destinations: Vec<ArtNetDestination>,
    pub universe_routing: BTreeMap<u16, usize>, // universe -> destination index
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct ArtNetDestination {
    pub name: String,
    pub mode: ArtNetMode,
}

impl NetworkConfig {
    /// Single destination with universe 1 routed to it. Falls back to
    /// broadcast when no destination address is given.
    pub fn new(source_ip: IpAddr, dest_ip: Option<IpAddr>, artnet_port: u16, broadcast: bool) -> Self {
        let mode = match dest_ip {
            Some(ip) if !broadcast => ArtNetMode::Unicast(
                SocketAddr::new(source_ip, artnet_port),
                SocketAddr::new(ip, artnet_port),
            ),
            _ => ArtNetMode::Broadcast,
        };

        let mut universe_routing = BTreeMap::new();
        universe_routing.insert(1, 0);

        NetworkConfig {
            destinations: vec![ArtNetDestination {
                name: "default".to_string(),
                mode,
            }],
            universe_routing,
            port: artnet_port,
        }
    }

    pub fn add_destination(&mut self, destination: ArtNetDestination) -> usize {
        self.destinations.push(destination);
        self.destinations.len() - 1
    }

    /// Ignored when `destination_index` does not exist.
    pub fn route_universe(&mut self, universe: u16, destination_index: usize) {
        if destination_index < self.destinations.len() {
            self.universe_routing.insert(universe, destination_index);
        }
    }

    pub fn destination_for_universe(&self, universe: u16) -> Option<usize> {
        self.universe_routing.get(&universe).copied()
    }

    pub fn describe(&self) -> String {
        if self.destinations.is_empty() {
            return "no destinations".to_string();
        }
        self.destinations
            .iter()
            .map(|dest| match &dest.mode {
                ArtNetMode::Unicast(src, destination) => {
                    format!("{}: {} -> {}", dest.name, src.ip(), destination)
                }
                ArtNetMode::Broadcast => format!("{}: 255.255.255.255:{}", dest.name, self.port),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_flag_wins() {
        let config = NetworkConfig::new(
            "10.0.0.1".parse().unwrap(),
            Some("10.0.0.2".parse().unwrap()),
            6454,
            true,
        );
        assert_eq!(config.destinations[0].mode, ArtNetMode::Broadcast);
        assert_eq!(config.destination_for_universe(1), Some(0));
    }

    #[test]
    fn test_route_to_missing_destination_ignored() {
        let mut config = NetworkConfig::new("10.0.0.1".parse().unwrap(), None, 6454, false);
        config.route_universe(2, 5);
        assert_eq!(config.destination_for_universe(2), None);

        let second = config.add_destination(ArtNetDestination {
            name: "stage left".to_string(),
            mode: ArtNetMode::Broadcast,
        });
        config.route_universe(2, second);
        assert_eq!(config.destination_for_universe(2), Some(1));
        assert!(config.describe().contains("stage left"));
    }
}
