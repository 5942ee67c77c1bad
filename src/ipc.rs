use std::net::IpAddr;

/// One line of the `serve` protocol.
#[derive(Eq, PartialEq, Debug)]
pub enum Message {
    Stop,
    Set {
        address: IpAddr,
        rate: String,
        burst: String,
    },
    Delete(IpAddr),
}

impl TryFrom<String> for Message {
    type Error = String;
    fn try_from(msg: String) -> std::result::Result<Self, Self::Error> {
        let parse = || -> Option<Message> {
            use Message::*;
            match msg.trim() {
                "Stop" => Some(Stop),
                msg if msg.starts_with("Set: ") => {
                    let mut msg = msg.split("Set: ").nth(1)?.split_whitespace();
                    let address = msg.next()?.parse().ok()?;
                    let rate = msg.next()?.to_string();
                    let burst = msg.next()?.to_string();
                    if msg.next().is_some() {
                        return None;
                    }
                    Some(Set {
                        address,
                        rate,
                        burst,
                    })
                }
                msg if msg.starts_with("Delete: ") => {
                    let address = msg.split("Delete: ").nth(1)?.trim().parse().ok()?;
                    Some(Delete(address))
                }
                _ => None,
            }
        };
        parse().ok_or(format!("failed to parse message: {}", msg.trim()))
    }
}

#[test]
fn parse_messages() {
    assert_eq!(Message::try_from("Stop\n".to_string()), Ok(Message::Stop));
    assert_eq!(
        Message::try_from("Set: 203.0.113.5 1mbit 32kbit\n".to_string()),
        Ok(Message::Set {
            address: "203.0.113.5".parse().unwrap(),
            rate: "1mbit".into(),
            burst: "32kbit".into(),
        })
    );
    assert_eq!(
        Message::try_from("Delete: 2001:db8::1".to_string()),
        Ok(Message::Delete("2001:db8::1".parse().unwrap()))
    );
    assert!(Message::try_from("Set: 203.0.113.5 1mbit".to_string()).is_err());
    assert!(Message::try_from("Set: 203.0.113.5 1mbit 32kbit extra".to_string()).is_err());
    assert!(Message::try_from("Delete: eth0".to_string()).is_err());
    assert_eq!(
        Message::try_from("Interface: eth0".to_string()),
        Err("failed to parse message: Interface: eth0".to_string())
    );
}
