use std::time::{Duration, Instant};

use rtp_twcc::{PacketStatus, TransportFeedback, TwccConfig, TwccManager};

mod common;
use common::{arrival, init_log, ms, push_all, receiver, rtp_packet_unstamped, us, TWCC_EXT_ID};

// Remote times start one full 24 bit wrap into the extended reference time.
const INITIAL_OFFSET: Duration = Duration::from_millis((1 << 24) * 64);

fn sender(epoch: Instant) -> TwccManager {
    TwccConfig::new()
        .set_send_ext_id(TWCC_EXT_ID)
        .set_sender_ssrc(2)
        .build(epoch)
        .expect("sender config")
}

fn rtcp(fci: &[u8]) -> Vec<u8> {
    TransportFeedback {
        sender_ssrc: 0x3039,
        media_ssrc: 0,
        fci: fci.to_vec(),
    }
    .to_bytes()
}

#[test]
pub fn bad_rtcp() {
    init_log();

    let mut twcc = sender(Instant::now());

    #[rustfmt::skip]
    let fci = [
        0xff, 0xff,       // base sequence number: max
        0xff, 0xff,       // packet status count: max
        0xff, 0xff, 0xff, // reference time: max
        0xff,             // feedback packet count: max
        0x3f, 0xff,       // run length: max
        0x00,             // only one delta
    ];

    assert!(twcc.decode_rtcp(&rtcp(&fci)).is_empty());
}

#[test]
pub fn not_transport_feedback() {
    init_log();

    let mut twcc = sender(Instant::now());

    let mut buf = rtcp(&[0; 12]);
    // Generic NACK
    buf[0] = 0x81;
    assert!(twcc.decode_rtcp(&buf).is_empty());

    assert!(twcc.decode_rtcp(&[0x8f, 205]).is_empty());
}

#[test]
pub fn feedback_count_wrap() {
    init_log();

    let mut twcc = sender(Instant::now());

    let fci1 = [0x05, 0xfd, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff, 0x00, 0x00, 0x00];
    let fci2 = [0x05, 0xfe, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00];

    // Jumping ahead in fb_pkt_count reports nothing extra.
    assert!(twcc.decode_rtcp(&rtcp(&fci1)).is_empty());
    assert!(twcc.decode_rtcp(&rtcp(&fci2)).is_empty());
}

#[test]
pub fn feedback_old_seqnum() {
    init_log();

    let mut twcc = sender(Instant::now());

    let fci1 = [0x05, 0xfd, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
    let fci2 = [0x05, 0xdc, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00];

    assert!(twcc.decode_rtcp(&rtcp(&fci1)).is_empty());
    assert!(twcc.decode_rtcp(&rtcp(&fci2)).is_empty());
}

#[test]
pub fn lost_between_reports() {
    init_log();

    let mut twcc = sender(Instant::now());

    // 10..=11, then 14 with 12 and 13 never reported.
    let fci1 = [0, 10, 0, 2, 0, 0, 0, 0, 0x20, 0x02, 0x00, 0x04];
    let fci2 = [0, 14, 0, 1, 0, 0, 0, 1, 0x20, 0x01, 0x04, 0x00];

    assert_eq!(twcc.decode_rtcp(&rtcp(&fci1)).len(), 2);

    let packets = twcc.decode_rtcp(&rtcp(&fci2));
    let seqs: Vec<_> = packets.iter().map(|p| (p.seq, p.status)).collect();
    assert_eq!(
        seqs,
        vec![
            (12, PacketStatus::NotReceived),
            (13, PacketStatus::NotReceived),
            (14, PacketStatus::SmallDelta),
        ]
    );
}

#[test]
pub fn delta_ts_rounding() {
    init_log();

    let mut twcc = sender(Instant::now());

    #[rustfmt::skip]
    let fci = [
        0x07, 0xd2,       // base sequence number: 2002
        0x00, 0x18,       // packet status count: 24
        0x00, 0x00, 0x92, // reference time: 9.344s
        0x00,
        0xb0, 0x00,       // 1 0 1 1 0 0 0 0 | 0 0 0 0 0 0 0 0
        0x96, 0x10,       // 1 0 0 1 0 1 1 0 | 0 0 0 1 0 0 0 0
        0x59, 0x00, 0x02, 0x63, 0x8d, 0x01,
        0x00, 0x00,
    ];

    let packets = twcc.decode_rtcp(&rtcp(&fci));
    assert_eq!(packets.len(), 24);

    let received: Vec<_> = packets
        .iter()
        .filter_map(|p| p.remote_arrival.map(|t| (p.seq, t)))
        .collect();

    let at = |nanos: u64| INITIAL_OFFSET + Duration::from_secs(9) + Duration::from_nanos(nanos);
    assert_eq!(
        received,
        vec![
            (2002, at(366_250_000)),
            (2003, at(366_250_000)),
            (2017, at(366_750_000)),
            (2019, at(391_500_000)),
            (2020, at(426_750_000)),
            (2025, at(427_000_000)),
        ]
    );
}

fn ref_time_fci(ref_time: [u8; 3]) -> Vec<u8> {
    #[rustfmt::skip]
    let mut fci = vec![
        0x00, 0x01,
        0x00, 0x02,
        0xcc, 0xcc, 0xcc,
        0x00,
        0x40, 0x02, // run of 2 large deltas
        0x0f, 0xa0, // +1s
        0xe0, 0xc0, // -2s
        0x00, 0x00,
    ];
    fci[4..7].copy_from_slice(&ref_time);
    fci
}

fn verify_ref_times(times: &[[u8; 3]], expected_units: &[u64], offset: Duration) {
    let mut twcc = sender(Instant::now());

    for (t, units) in times.iter().zip(expected_units) {
        let packets = twcc.decode(&ref_time_fci(*t));
        assert_eq!(packets.len(), 2);

        let base = offset + ms(64) * (*units as u32);
        assert_eq!(packets[0].remote_arrival, Some(base + Duration::from_secs(1)));
        assert_eq!(packets[1].remote_arrival, Some(base - Duration::from_secs(1)));
    }
}

#[test]
pub fn reference_time_wrap() {
    init_log();

    let times = [
        [0x7f, 0xff, 0xfe],
        // increase over signed wrap
        [0x80, 0x00, 0x03],
        // decrease over signed wrap
        [0x7f, 0xff, 0xf7],
        // increase over signed wrap again
        [0xff, 0xff, 0xf1],
        // increase over unsigned wrap
        [0x00, 0x00, 0x05],
        // decrease over unsigned wrap
        [0xff, 0xff, 0xfe],
        // increase over unsigned wrap again
        [0x55, 0x55, 0x55],
        [0xaa, 0xaa, 0xaa],
        [0x00, 0x00, 0x42],
    ];

    let units = [
        0x07ffffe, 0x0800003, 0x07ffff7, 0x0fffff1, 0x1000005, 0x0fffffe, 0x1555555, 0x1aaaaaa,
        0x2000042,
    ];

    verify_ref_times(&times, &units, INITIAL_OFFSET);
}

#[test]
pub fn reference_time_wrap_start_negative() {
    init_log();

    let times = [[0x80, 0x00, 0x03], [0x7f, 0xff, 0xf7], [0xff, 0xff, 0xf1]];
    let units = [0x800003, 0x7ffff7, 0xfffff1];

    verify_ref_times(&times, &units, Duration::ZERO);
}

#[test]
pub fn recv_rtcp_reordered() {
    init_log();

    let epoch = Instant::now();
    let mut recv = receiver(epoch);

    let arrivals: Vec<_> = (1..=8)
        .map(|i| arrival(i, Duration::from_secs(i as u64), i % 2 == 0))
        .collect();
    push_all(&mut recv, epoch, &arrivals);

    let reports: Vec<_> = std::iter::from_fn(|| recv.poll_feedback())
        .map(|f| f.to_bytes())
        .collect();
    assert_eq!(reports.len(), 4);

    let mut send = sender(epoch);

    for idx in [0, 2, 1, 3] {
        let packets = send.decode_rtcp(&reports[idx]);

        let seqs: Vec<_> = packets.iter().map(|p| p.seq).collect();
        let first = idx as u16 * 2 + 1;
        assert_eq!(seqs, vec![first, first + 1]);

        let a = packets[0].remote_arrival.unwrap();
        let b = packets[1].remote_arrival.unwrap();
        assert_eq!(b - a, Duration::from_secs(1));
    }
}

#[test]
pub fn send_and_recv() {
    init_log();

    let epoch = Instant::now();
    let mut send = sender(epoch);
    let mut recv = receiver(epoch);

    for i in 0..10_u16 {
        let sent_at = epoch + ms(i as u64 * 20);
        let mut buf = rtp_packet_unstamped(1000 + i, i == 9);
        let seq = send.tag_outgoing(&mut buf, sent_at).expect("tagged");
        assert_eq!(seq, i);

        send.set_socket_timestamp(seq, sent_at + us(100));
        recv.record_incoming(&buf, sent_at + ms(15));
    }

    let fb = recv.poll_feedback().expect("feedback");
    assert_eq!(fb.media_ssrc, common::MEDIA_SSRC);

    let packets = send.decode_rtcp(&fb.to_bytes());
    assert_eq!(packets.len(), 10);

    for (i, p) in packets.iter().enumerate() {
        let sent_at = epoch + ms(i as u64 * 20);
        assert_eq!(p.seq, i as u16);
        assert!(p.status.is_received());
        assert_eq!(p.local_send, Some(sent_at + us(100)));
        assert_eq!(p.payload_type, Some(96));
        assert_eq!(p.size, Some(60));
    }

    let first = packets[0].remote_arrival.unwrap();
    let last = packets[9].remote_arrival.unwrap();
    assert_eq!(last - first, ms(180));

    // Everything but the last reported packet is forgotten.
    assert_eq!(send.sent_packets().len(), 1);
}

#[test]
pub fn various_gaps() {
    init_log();

    // Around the vector capacities and the longest run.
    let gaps = (1..=50).chain(8189..=8194).chain([16382, 16383, 16384]);

    for seq in gaps {
        let epoch = Instant::now();
        let mut recv = receiver(epoch);
        let mut send = sender(epoch);

        let arrivals = [
            arrival(0, us(0), false),
            arrival(seq, us(seq as u64 * 250), true),
        ];
        push_all(&mut recv, epoch, &arrivals);

        let fb = recv.poll_feedback().expect("feedback");
        assert!(recv.poll_feedback().is_none());

        let packets = send.decode_rtcp(&fb.to_bytes());
        assert_eq!(packets.len(), seq as usize + 1, "gap {}", seq);

        for (i, p) in packets.iter().enumerate() {
            assert_eq!(p.seq, i as u16);
            let received = i == 0 || i == seq as usize;
            assert_eq!(p.status.is_received(), received, "gap {} seq {}", seq, i);
        }

        let first = packets[0].remote_arrival.unwrap();
        let last = packets[seq as usize].remote_arrival.unwrap();
        assert_eq!(last - first, us(seq as u64 * 250), "gap {}", seq);
    }
}

#[test]
pub fn malformed_report_is_not_fatal() {
    init_log();

    let epoch = Instant::now();
    let mut send = sender(epoch);

    assert!(send.decode(&[0x00; 4]).is_empty());

    let fci = [0, 1, 0, 1, 0, 0, 0, 0, 0x20, 0x01, 0x04, 0x00];
    let packets = send.decode(&fci);
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0].local_send, None);
}
