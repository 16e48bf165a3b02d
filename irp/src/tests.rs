use crate::{Error, IrSequence, Parameters, Pass, Protocol, RenderSession};

fn raw(s: &str) -> Vec<i32> {
    IrSequence::parse(s, false).unwrap().to_ints(true)
}

fn params(list: &[(&str, i64)]) -> Parameters {
    list.iter()
        .map(|(name, value)| (name.to_string(), *value))
        .collect()
}

fn compare_with_rounding(l: &[i32], r: &[i32]) -> bool {
    if l.len() != r.len() {
        println!(
            "comparing:\n{l:?} with\n{r:?}\n have different lengths {} and {}",
            l.len(),
            r.len()
        );

        return false;
    }

    l.iter().zip(r).all(|(l, r)| {
        let diff = (l - r).unsigned_abs();
        // more than 8 and more than 1 promille
        if diff > 8 && diff * 1000 / l.unsigned_abs() > 0 {
            println!("{l} and {r} differ too much");
            false
        } else {
            true
        }
    })
}

const NEC1: &str = "{38.4k,564}<1,-1|1,-3>(16,-8,D:8,S:8,F:8,~F:8,1,^108m,(16,-4,1,^108m)*)[D:0..255,S:0..255=255-D,F:0..255]";
const RC5: &str = "{36k,msb,889}<1,-1|-1,1>((1,~F:1:6,T:1,D:5,F:6,^114m)*,T=1-T)[D:0..31,F:0..127,T@:0..1=0]";

#[test]
fn nec() {
    let irp = Protocol::parse("{38.4k,564}<1,-1|1,-3>(16,-8,D:8,S:8,F:8,~F:8,1,^108m)* [D:0..255,S:0..255=255-D,F:0..255]").unwrap();

    let signal = irp
        .render_ir_signal(&params(&[("F", 1), ("D", 0xe9)]))
        .unwrap();

    assert_eq!(signal.frequency, 38400.0);
    assert!(signal.intro.is_empty());
    assert!(signal.ending.is_empty());
    assert_eq!(
        signal.repeat.to_ints(true),
        raw("+9024,-4512,+564,-1692,+564,-564,+564,-564,+564,-1692,+564,-564,+564,-1692,+564,-1692,+564,-1692,+564,-564,+564,-1692,+564,-1692,+564,-564,+564,-1692,+564,-564,+564,-564,+564,-564,+564,-1692,+564,-564,+564,-564,+564,-564,+564,-564,+564,-564,+564,-564,+564,-564,+564,-564,+564,-1692,+564,-1692,+564,-1692,+564,-1692,+564,-1692,+564,-1692,+564,-1692,+564,-39756")
    );
}

#[test]
fn nec1_intro_and_repeat() {
    let irp = Protocol::parse(NEC1).unwrap();

    let signal = irp.render_ir_signal_dsft(Some(0xe9), Some(0xfe), Some(1), None).unwrap();

    assert_eq!(
        signal.intro.to_ints(true),
        raw("+9024,-4512,+564,-1692,+564,-564,+564,-564,+564,-1692,+564,-564,+564,-1692,+564,-1692,+564,-1692,+564,-564,+564,-1692,+564,-1692,+564,-1692,+564,-1692,+564,-1692,+564,-1692,+564,-1692,+564,-1692,+564,-564,+564,-564,+564,-564,+564,-564,+564,-564,+564,-564,+564,-564,+564,-564,+564,-1692,+564,-1692,+564,-1692,+564,-1692,+564,-1692,+564,-1692,+564,-1692,+564,-35244")
    );
    assert_eq!(signal.repeat.to_ints(true), vec![9024, -2256, 564, -96156]);
    assert!(signal.ending.is_empty());

    assert_eq!(irp.parameter_default("S", &params(&[("D", 12)])), Ok(Some(243)));
    assert_eq!(irp.parameter_default("F", &params(&[])), Ok(None));
    assert!(matches!(
        irp.parameter_max("X"),
        Err(Error::Unassigned(_))
    ));
    assert!(!irp.has_advanced_parameters());
}

#[test]
fn rc5_without_parameter_specs() {
    let irp = Protocol::parse("{36k,msb,889}<1,-1|-1,1>(1:1,~F:1:6,T:1,D:5,F:6,^114m)+").unwrap();

    let signal = irp
        .render_ir_signal(&params(&[("F", 1), ("D", 0xe9), ("T", 0)]))
        .unwrap();

    // the intro is the same as the repeat
    assert!(signal.intro.is_empty());
    assert_eq!(
        signal.repeat.to_ints(true),
        raw("+889,-889,+1778,-889,+889,-1778,+1778,-889,+889,-1778,+1778,-889,+889,-889,+889,-889,+889,-889,+889,-1778,+889,-89108")
    );
}

#[test]
fn definitions() {
    let irp = Protocol::parse("{38k,400}<1,-1|1,-3>(8,-4,170:8,90:8,15:4,D:4,S:8,F:8,E:4,C:4,1,-48)+ {E=1,C=D^S:4:0^S:4:4^F:4:0^F:4:4^E:4}").unwrap();

    let signal = irp
        .render_ir_signal(&params(&[("F", 1), ("D", 0xe9), ("S", 0x88)]))
        .unwrap();

    assert_eq!(
        signal.repeat.to_ints(true),
        raw("+3200,-1600,+400,-400,+400,-1200,+400,-400,+400,-1200,+400,  -400  +400,-1200,+400,-400,+400,-1200,+400,-400,+400,-1200,+400,-400,+400,-1200,+400,-1200,+400,-400,+400,-1200,+400,-400,+400,-1200,+400,-1200,+400,-1200,+400,-1200,+400,-1200,+400,-400,+400,-400,+400,-1200,+400,-400,+400,-400,+400,-400,+400,-1200,+400,-400,+400,-400,+400,-400,+400,-1200,+400,-1200,+400,-400,+400,-400,+400,-400,+400,-400,+400,-400,+400,-400,+400,-400,+400,-1200,+400,-400,+400,-400,+400,-400,+400,-1200,+400,-400,+400,-400,+400,-1200,+400,-19200")
    );
}

#[test]
fn rs200() {
    let irp = Protocol::parse("{35.7k,msb}<50p,-120p|21p,-120p>(25:6,(H4-1):2,(H3-1):2,(H2-1):2,(H1-1):2,P:1,(D-1):3,F:2,0:2,sum:4,-1160p)*{   P=~(#(D-1)+#F):1,sum=9+((H4-1)*4+(H3-1)) + ((H2-1)*4+(H1-1)) + (P*8+(D-1)) + F*4}").unwrap();

    let signal = irp
        .render_ir_signal(&params(&[
            ("D", 4),
            ("F", 1),
            ("H1", 4),
            ("H2", 2),
            ("H3", 3),
            ("H4", 4),
        ]))
        .unwrap();

    assert!(compare_with_rounding(
        &signal.repeat.to_ints(true),
        &raw("+1401,-3361,+588,-3361,+588,-3361,+1401,-3361,+1401,-3361,+588,-3361,+588,-3361,+588,-3361,+588,-3361,+1401,-3361,+1401,-3361,+588,-3361,+588,-3361,+588,-3361,+1401,-3361,+1401,-3361,+588,-3361,+588,-3361,+1401,-3361,+588,-3361,+1401,-3361,+1401,-3361,+1401,-3361,+588,-3361,+1401,-3361,+588,-35854")
    ));
}

#[test]
fn variations() {
    let irp = Protocol::parse("{}<1,-1|1,-3>([11][22][33],-100)+").unwrap();
    let signal = irp.render_ir_signal(&params(&[])).unwrap();

    assert_eq!(signal.intro.to_ints(true), vec![11, -100]);
    assert_eq!(signal.repeat.to_ints(true), vec![22, -100]);
    assert_eq!(signal.ending.to_ints(true), vec![33, -100]);

    // an empty alternative cuts the rest of the stream
    let irp = Protocol::parse("{}<1,-1|1,-3>(111,-222,[11][][33],-100)+").unwrap();
    let signal = irp.render_ir_signal(&params(&[])).unwrap();

    assert_eq!(
        signal.to_int_array(1),
        raw("+111 -222 +11 -100 +111 -222 +111 -222 +33 -100")
    );

    // variations in a stream without repeats only give the intro
    let irp = Protocol::parse("{100}<1,-1|1,-3>([1][2],-10,10:10,1,-100m)").unwrap();
    let signal = irp.render_ir_signal(&params(&[])).unwrap();
    assert_eq!(signal.intro.to_ints(true)[..2], [100, -1000]);
    assert!(signal.repeat.is_empty());

    let irp = Protocol::parse("{}<1,-1|1,-3>([11][22],-100)*").unwrap();
    assert!(matches!(
        irp.render_ir_signal(&params(&[])),
        Err(Error::InvalidRepeat(_))
    ));
}

#[test]
fn nested_infinite_repeats() {
    let irp = Protocol::parse("{}<1,-1|1,-3>((1,-2)*,-10)*").unwrap();

    assert!(matches!(
        irp.render_ir_signal(&params(&[])),
        Err(Error::InvalidRepeat(_))
    ));

    let irp = Protocol::parse("{}<1,-1|1,-3>((1,-2)3,-10)*").unwrap();
    let signal = irp.render_ir_signal(&params(&[])).unwrap();
    assert_eq!(signal.repeat.to_ints(true), vec![1, -2, 1, -2, 1, -12]);
}

#[test]
fn domain() {
    let irp = Protocol::parse(
        "{40k,520,msb}<1,-10|1,-1,1,-8>(S:1,<1:2|2:2>(F:D),-90m)*{D=8}[S:0..1,F:1..255]",
    )
    .unwrap();

    assert!(matches!(
        irp.render_ir_signal(&params(&[("S", 2), ("F", 0xe9)])),
        Err(Error::DomainViolation(_))
    ));
    assert!(matches!(
        irp.render_ir_signal(&params(&[("S", 1), ("F", 0)])),
        Err(Error::DomainViolation(_))
    ));
    assert!(matches!(
        irp.render_ir_signal(&params(&[("S", 1)])),
        Err(Error::Unassigned(_))
    ));

    // unknown parameters are ignored
    assert!(irp
        .render_ir_signal(&params(&[("S", 1), ("F", 2), ("X", 0)]))
        .is_ok());

    let irp = Protocol::parse("{40k,520,msb}<1,-10|1,-1,1,-8>(S:1,<1:2|2:2>(F:D),-90m)*{D=8}")
        .unwrap();
    assert!(irp
        .render_ir_signal(&params(&[("S", 1), ("F", 2), ("X", 0)]))
        .is_ok());
}

#[test]
fn errors() {
    let irp = Protocol::parse("{}<1,-1|1,-3>(A:4,-10)+").unwrap();
    assert!(matches!(
        irp.render_ir_signal(&params(&[])),
        Err(Error::Unassigned(_))
    ));

    let irp = Protocol::parse("{}<1,-1|1,-3>((10/A):4,-10)+").unwrap();
    assert!(matches!(
        irp.render_ir_signal(&params(&[("A", 0)])),
        Err(Error::Arithmetic(_))
    ));

    // one bit with two bits worth of bitspec
    let irp = Protocol::parse("{33k,1}<16p,-p>(F:1)2[F:0..1]").unwrap();
    assert!(irp.render_ir_signal(&params(&[("F", 1)])).is_err());

    let irp = Protocol::parse("{33k,1}<16p,-p|8p,-p|4p,-p>(F:1)2[F:0..1]").unwrap();
    assert!(irp.render_ir_signal(&params(&[("F", 1)])).is_err());
}

#[test]
fn pass_consistency() {
    for (irp, params) in [
        (NEC1, params(&[("D", 12), ("F", 34)])),
        ("{}<1,-1|1,-3>(111,-222,[11][][33],-100)+", params(&[])),
        ("{}<1,-1|1,-3>([11][22][33],-100)+", params(&[])),
        (
            "{40k,520,msb}<1,-10|1,-1,1,-8>(S:1,<1:2|2:2>(F:D),-90m)*{D=8}[S:0..1,F:1..255]",
            params(&[("S", 1), ("F", 3)]),
        ),
    ] {
        let irp = Protocol::parse(irp).unwrap();

        let signal = irp.render_ir_signal(&params).unwrap();

        let mut session = RenderSession::new();
        let all = irp
            .render_pass(&mut session, &params, Pass::All, true)
            .unwrap();

        let concatenated = signal
            .intro
            .append(&signal.repeat)
            .append(&signal.ending);

        assert_eq!(all.to_ints(true), concatenated.to_ints(true), "{irp}");

        for (pass, part) in [
            (Pass::Repeat, &signal.repeat),
            (Pass::Ending, &signal.ending),
        ] {
            let seq = irp.render_pass(&mut session, &params, pass, true).unwrap();
            assert_eq!(seq.to_ints(true), part.to_ints(true), "{irp} {pass}");
        }
    }
}

#[test]
fn toggle() {
    let irp = Protocol::parse(RC5).unwrap();
    let params = params(&[("D", 5), ("F", 12)]);

    assert_eq!(irp.number_of_toggle_values(&params), 2);

    let mut session = RenderSession::new();
    assert!(session.is_virgin());

    let first = irp
        .render_ir_signal_with(&mut session, &params, Pass::All, false)
        .unwrap();
    assert_eq!(session.memory().get("T"), Some(&1));
    assert_eq!(session.count(), 1);
    assert!(!session.is_virgin());

    let second = irp
        .render_ir_signal_with(&mut session, &params, Pass::All, false)
        .unwrap();
    let third = irp
        .render_ir_signal_with(&mut session, &params, Pass::All, false)
        .unwrap();

    assert_ne!(first.repeat, second.repeat);
    assert_eq!(first.repeat, third.repeat);
    assert_eq!(session.count(), 3);

    // an initial render starts over
    let again = irp
        .render_ir_signal_with(&mut session, &params, Pass::All, true)
        .unwrap();
    assert_eq!(first.repeat, again.repeat);
    assert_eq!(session.count(), 1);

    // the toggle given explicitly
    let mut explicit = params.clone();
    explicit.insert("T".into(), 1);
    assert_eq!(irp.number_of_toggle_values(&explicit), 1);
    assert_eq!(irp.render_ir_signal(&explicit).unwrap().repeat, second.repeat);
}

#[test]
fn batch() {
    let irp = Protocol::parse(NEC1).unwrap();

    let res = irp.render_batch((254..258).map(|f| params(&[("D", 1), ("F", f)])));

    assert_eq!(res.len(), 4);
    assert!(res[0].1.is_ok());
    assert!(res[1].1.is_ok());
    assert!(matches!(res[2].1, Err(Error::DomainViolation(_))));
    assert!(matches!(res[3].1, Err(Error::DomainViolation(_))));
    assert_eq!(res[3].0["F"], 257);
}

#[test]
fn display_round_trip() {
    for irp in [
        NEC1,
        RC5,
        "{38k,400}<1,-1|1,-3>(8,-4,170:8,90:8,15:4,D:4,S:8,F:8,E:4,C:4,1,-48)+{E=1,C=D^S:4:0^S:4:4^F:4:0^F:4:4^E:4}",
        "{}<1,-1|1,-3>(111,-222,[11][][33],-100)+",
    ] {
        let protocol = Protocol::parse(irp).unwrap();
        let printed = protocol.to_string();
        let reparsed = Protocol::parse(&printed).unwrap();

        assert_eq!(protocol, reparsed, "{printed}");
    }
}
