use super::Header;
use crate::{
    datastructures::{common::PortIdentity, WireFormat, WireFormatError},
    time::Time,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PDelayRespMessage {
    pub(crate) header: Header,
    pub(crate) request_receipt_timestamp: Time,
    pub(crate) requesting_port_identity: PortIdentity,
}

impl PDelayRespMessage {
    pub(crate) fn serialize_content(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        if buffer.len() < 20 {
            return Err(WireFormatError::BufferTooShort);
        }

        self.request_receipt_timestamp
            .write_to(&mut buffer[0..10])?;
        self.requesting_port_identity
            .serialize(&mut buffer[10..20])?;

        Ok(())
    }

    pub(crate) fn deserialize_content(
        header: Header,
        buffer: &[u8],
    ) -> Result<Self, WireFormatError> {
        if buffer.len() < 20 {
            return Err(WireFormatError::BufferTooShort);
        }

        Ok(Self {
            header,
            request_receipt_timestamp: Time::read_from(&buffer[0..10])?,
            requesting_port_identity: PortIdentity::deserialize(&buffer[10..20])?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastructures::common::ClockIdentity;

    #[test]
    fn pdelay_resp_wireformat() {
        let representations = [(
            [
                0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x0a, 0x0b, 0x0c,
                0x0d, 0x0e, 0x0f, 0x10, 0x11, 0x12, 0x34u8,
            ],
            PDelayRespMessage {
                header: Header::default(),
                request_receipt_timestamp: Time::default(),
                requesting_port_identity: PortIdentity {
                    clock_identity: ClockIdentity([0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f, 0x10, 0x11]),
                    port_number: 0x1234,
                },
            },
        )];

        for (byte_representation, object_representation) in representations {
            let mut serialization_buffer = [0; 20];
            object_representation
                .serialize_content(&mut serialization_buffer)
                .unwrap();
            assert_eq!(serialization_buffer, byte_representation);

            let deserialized_data =
                PDelayRespMessage::deserialize_content(Header::default(), &byte_representation)
                    .unwrap();
            assert_eq!(deserialized_data, object_representation);
        }
    }
}
