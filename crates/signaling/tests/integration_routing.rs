//! Integration-Tests fuer Anmeldung und Routing (FakeReactor, ohne Sockets)

use std::time::Duration;

use plauder_auth::digest_base64;
use plauder_core::ConnectionId;
use plauder_db::{MemoryUserStore, UserStore};
use plauder_protocol::{Aktion, Antwort, Antwortcode, Frame};
use plauder_signaling::{ControlLoop, FakeNetz, FakeReactor, ServerHandle, SignalingConfig};

struct Umgebung {
    schleife: ControlLoop<FakeReactor, MemoryUserStore>,
    netz: FakeNetz,
    store: MemoryUserStore,
    handle: ServerHandle,
}

fn secret(name: &str) -> Vec<u8> {
    format!("{name}-secret").into_bytes()
}

fn umgebung_mit(config: SignalingConfig) -> Umgebung {
    let (reactor, netz) = FakeReactor::neu();
    let store = MemoryUserStore::neu();
    for name in ["alice", "bob", "carol"] {
        store.register_user(name, &secret(name)).unwrap();
    }
    let schleife = ControlLoop::neu(reactor, store.clone(), config);
    let handle = schleife.handle();
    Umgebung {
        schleife,
        netz,
        store,
        handle,
    }
}

fn umgebung() -> Umgebung {
    umgebung_mit(SignalingConfig::default())
}

impl Umgebung {
    fn tick(&mut self) {
        self.schleife.tick().expect("Tick fehlgeschlagen");
    }

    fn verbinden(&mut self) -> ConnectionId {
        let id = self.netz.verbinden();
        self.tick();
        id
    }

    fn senden(&mut self, id: ConnectionId, frame: Frame) {
        self.netz.einspeisen(id, &frame);
        self.tick();
    }

    /// Presence schicken und die Nonce aus der 511-Antwort holen
    fn challenge_holen(&mut self, id: ConnectionId, name: &str, pubkey: Option<&str>) -> String {
        self.senden(id, Frame::presence(name, pubkey.map(str::to_string)));
        let frames = self.netz.ausgang(id);
        assert_eq!(frames.len(), 1, "genau eine Challenge erwartet: {frames:?}");
        match &frames[0] {
            Frame::Antwort(Antwort {
                response: Antwortcode::Authentifizierung,
                data: Some(nonce),
                ..
            }) => nonce.clone(),
            andere => panic!("511 erwartet, war {andere:?}"),
        }
    }

    /// Vollstaendige Anmeldung auf einer neuen Verbindung
    fn anmelden(&mut self, name: &str) -> ConnectionId {
        self.anmelden_mit_schluessel(name, None)
    }

    fn anmelden_mit_schluessel(&mut self, name: &str, pubkey: Option<&str>) -> ConnectionId {
        let id = self.verbinden();
        let nonce = self.challenge_holen(id, name, pubkey);
        self.senden(id, Frame::auth_antwort(digest_base64(&secret(name), &nonce).unwrap()));
        assert_eq!(self.netz.ausgang(id), vec![Frame::from(Antwort::ok())]);
        id
    }
}

fn fehler(text: &str) -> Frame {
    Frame::from(Antwort::fehler(text))
}

/// JSON-Text mit Laengenpraefix, wie ihn ein fremder Client schicken wuerde
fn gerahmt(json: &[u8]) -> Vec<u8> {
    let mut roh = (json.len() as u32).to_be_bytes().to_vec();
    roh.extend_from_slice(json);
    roh
}

// ---------------------------------------------------------------------------
// Anmeldung
// ---------------------------------------------------------------------------

#[test]
fn presence_liefert_genau_eine_challenge_vor_jeder_sitzung() {
    let mut u = umgebung();
    let id = u.verbinden();
    let nonce = u.challenge_holen(id, "alice", None);

    assert_eq!(nonce.len(), 128);
    assert!(u.handle.online_users().is_empty());
    assert!(!u.netz.ist_geschlossen(id));
}

#[test]
fn anmeldung_bindet_namen_und_vermerkt_login() {
    let mut u = umgebung();
    u.anmelden_mit_schluessel("alice", Some("ALICE-KEY"));

    assert_eq!(u.handle.online_users(), vec!["alice"]);
    let aktiv = u.store.active_users().unwrap();
    assert_eq!(aktiv.len(), 1);
    assert_eq!(aktiv[0].name, "alice");
    assert_eq!(u.store.get_public_key("alice").unwrap().as_deref(), Some("ALICE-KEY"));
}

#[test]
fn falsches_passwort_trennt_verbindung() {
    let mut u = umgebung();
    let id = u.verbinden();
    let nonce = u.challenge_holen(id, "alice", None);

    u.senden(id, Frame::auth_antwort(digest_base64(b"falsch", &nonce).unwrap()));

    assert_eq!(u.netz.ausgang(id), vec![fehler("bad password")]);
    assert!(u.netz.ist_geschlossen(id));
    assert!(u.handle.online_users().is_empty());
}

#[test]
fn viele_falsche_secrets_werden_alle_abgelehnt() {
    let mut u = umgebung();
    for versuch in 0..50 {
        let id = u.verbinden();
        let nonce = u.challenge_holen(id, "bob", None);
        let falsch = format!("bob-secret-{versuch}");
        u.senden(id, Frame::auth_antwort(digest_base64(falsch.as_bytes(), &nonce).unwrap()));

        assert_eq!(u.netz.ausgang(id), vec![fehler("bad password")]);
        assert!(u.netz.ist_geschlossen(id));
    }
    assert!(u.handle.online_users().is_empty());
}

#[test]
fn unbekannter_benutzer_wird_abgelehnt() {
    let mut u = umgebung();
    let id = u.verbinden();
    u.senden(id, Frame::presence("mallory", None));

    assert_eq!(u.netz.ausgang(id), vec![fehler("user not registered")]);
    assert!(u.netz.ist_geschlossen(id));
}

#[test]
fn doppelter_name_wird_abgelehnt() {
    let mut u = umgebung();
    let erste = u.anmelden("alice");

    let zweite = u.verbinden();
    u.senden(zweite, Frame::presence("alice", None));

    assert_eq!(u.netz.ausgang(zweite), vec![fehler("username taken")]);
    assert!(u.netz.ist_geschlossen(zweite));
    assert!(!u.netz.ist_geschlossen(erste));
    assert_eq!(u.handle.online_users(), vec!["alice"]);
}

#[test]
fn gleichzeitige_presence_ergibt_genau_eine_sitzung() {
    let mut u = umgebung();
    let a = u.verbinden();
    let b = u.verbinden();

    let nonce_a = u.challenge_holen(a, "alice", None);
    let nonce_b = u.challenge_holen(b, "alice", None);

    // Beide Antworten im selben Tick
    u.netz
        .einspeisen(a, &Frame::auth_antwort(digest_base64(&secret("alice"), &nonce_a).unwrap()));
    u.netz
        .einspeisen(b, &Frame::auth_antwort(digest_base64(&secret("alice"), &nonce_b).unwrap()));
    u.tick();

    let antworten_a = u.netz.ausgang(a);
    let antworten_b = u.netz.ausgang(b);
    let erfolge = [&antworten_a, &antworten_b]
        .into_iter()
        .filter(|f| **f == vec![Frame::from(Antwort::ok())])
        .count();
    let abgelehnt = [&antworten_a, &antworten_b]
        .into_iter()
        .filter(|f| **f == vec![fehler("username taken")])
        .count();

    assert_eq!(erfolge, 1);
    assert_eq!(abgelehnt, 1);
    assert_eq!(u.handle.online_users(), vec!["alice"]);
    assert_eq!(u.schleife.verbindungen_anzahl(), 1);
}

#[test]
fn anfrage_vor_anmeldung_bleibt_offen() {
    let mut u = umgebung();
    let id = u.verbinden();
    u.senden(
        id,
        Frame::Aktion(Aktion::GetContacts {
            time: None,
            user: "alice".into(),
        }),
    );

    assert_eq!(u.netz.ausgang(id), vec![fehler("must authenticate first")]);
    assert!(!u.netz.ist_geschlossen(id));
}

#[test]
fn ungueltiger_frame_ist_bad_request() {
    let mut u = umgebung();
    let id = u.verbinden();
    u.netz.einspeisen_roh(id, &gerahmt(br#"{"action":"teleport","time":1.0}"#));
    u.tick();

    assert_eq!(u.netz.ausgang(id), vec![fehler("bad request")]);
    assert!(!u.netz.ist_geschlossen(id));
}

#[test]
fn presence_ohne_zeitstempel_liefert_challenge() {
    let mut u = umgebung();
    let id = u.verbinden();
    u.netz
        .einspeisen_roh(id, &gerahmt(br#"{"action":"presence","user":{"account_name":"alice"}}"#));
    u.tick();

    let frames = u.netz.ausgang(id);
    assert_eq!(frames.len(), 1);
    match &frames[0] {
        Frame::Antwort(Antwort {
            response: Antwortcode::Authentifizierung,
            data: Some(nonce),
            ..
        }) => assert_eq!(nonce.len(), 128),
        andere => panic!("511 erwartet, war {andere:?}"),
    }
    assert!(!u.netz.ist_geschlossen(id));
}

#[test]
fn anderer_frame_nach_challenge_ist_falsches_passwort() {
    let mut u = umgebung();
    let id = u.verbinden();
    u.challenge_holen(id, "alice", None);

    u.senden(
        id,
        Frame::Aktion(Aktion::UsersRequest {
            time: None,
            account_name: "alice".into(),
        }),
    );

    assert_eq!(u.netz.ausgang(id), vec![fehler("bad password")]);
    assert!(u.netz.ist_geschlossen(id));
}

#[test]
fn presence_nach_anmeldung_ist_bad_request() {
    let mut u = umgebung();
    let id = u.anmelden("alice");
    u.senden(id, Frame::presence("alice", None));

    assert_eq!(u.netz.ausgang(id), vec![fehler("bad request")]);
    assert_eq!(u.handle.online_users(), vec!["alice"]);
}

#[test]
fn challenge_laeuft_ab() {
    let mut u = umgebung_mit(SignalingConfig {
        challenge_timeout: Duration::from_millis(5),
        ..SignalingConfig::default()
    });
    let id = u.verbinden();
    u.netz.einspeisen(id, &Frame::presence("alice", None));
    u.tick();
    std::thread::sleep(Duration::from_millis(30));
    u.tick();

    let frames = u.netz.ausgang(id);
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].antwortcode(), Some(Antwortcode::Authentifizierung));
    assert_eq!(frames[1], fehler("authentication timeout"));
    assert!(u.netz.ist_geschlossen(id));
}

// ---------------------------------------------------------------------------
// Nachrichten
// ---------------------------------------------------------------------------

#[test]
fn nachricht_an_abwesenden_und_spaeter_zustellung() {
    let mut u = umgebung();
    let alice = u.anmelden("alice");
    let nachricht = Frame::nachricht("alice", "bob", "hi");

    u.senden(alice, nachricht.clone());
    assert_eq!(u.netz.ausgang(alice), vec![fehler("user not registered")]);
    assert_eq!(u.handle.online_users(), vec!["alice"]);
    assert_eq!(u.schleife.verbindungen_anzahl(), 1);

    // Nicht zugestellt, nicht gezaehlt
    assert_eq!(u.store.message_counts("alice").unwrap().gesendet, 0);
    assert_eq!(u.store.message_counts("bob").unwrap().empfangen, 0);

    let bob = u.anmelden("bob");
    u.senden(alice, nachricht.clone());

    assert_eq!(u.netz.ausgang(bob), vec![nachricht]);
    assert_eq!(u.netz.ausgang(alice), vec![Frame::from(Antwort::ok())]);
    assert_eq!(u.store.message_counts("alice").unwrap().gesendet, 1);
    assert_eq!(u.store.message_counts("bob").unwrap().empfangen, 1);
}

#[test]
fn nachricht_kommt_byte_genau_beim_empfaenger_an() {
    let mut u = umgebung();
    let alice = u.anmelden("alice");
    let bob = u.anmelden("bob");

    // Ganzzahliger Zeitstempel und ein Feld, das der Server nicht kennt
    let json: &[u8] = br#"{"action":"message","time":1700000000,"from":"alice","to":"bob","mess_text":"hi","encoding":"utf-8"}"#;
    u.netz.einspeisen_roh(alice, &gerahmt(json));
    u.tick();

    let angekommen = u.netz.ausgang_roh(bob);
    assert_eq!(angekommen.len(), 1);
    assert_eq!(&angekommen[0][..], json);
    assert_eq!(u.netz.ausgang(alice), vec![Frame::from(Antwort::ok())]);
}

#[test]
fn nachricht_ohne_zeitstempel_wird_zugestellt() {
    let mut u = umgebung();
    let alice = u.anmelden("alice");
    let json: &[u8] = br#"{"action":"message","from":"alice","to":"bob","mess_text":"hi"}"#;

    u.netz.einspeisen_roh(alice, &gerahmt(json));
    u.tick();
    assert_eq!(u.netz.ausgang(alice), vec![fehler("user not registered")]);

    let bob = u.anmelden("bob");
    u.netz.einspeisen_roh(alice, &gerahmt(json));
    u.tick();

    let angekommen = u.netz.ausgang_roh(bob);
    assert_eq!(angekommen.len(), 1);
    assert_eq!(&angekommen[0][..], json);
    assert_eq!(u.netz.ausgang(alice), vec![Frame::from(Antwort::ok())]);
}

#[test]
fn nachricht_ohne_empfaenger_ist_bad_request() {
    let mut u = umgebung();
    let alice = u.anmelden("alice");
    let bob = u.anmelden("bob");

    let json = br#"{"action":"message","time":1.0,"from":"alice","mess_text":"hi"}"#;
    u.netz.einspeisen_roh(alice, &gerahmt(json));
    u.tick();

    assert_eq!(u.netz.ausgang(alice), vec![fehler("bad request")]);
    assert!(u.netz.ausgang(bob).is_empty());
    assert!(!u.netz.ist_geschlossen(alice));
    assert_eq!(u.handle.online_users(), vec!["alice", "bob"]);
}

#[test]
fn nachricht_mit_fremdem_absender_wird_abgelehnt() {
    let mut u = umgebung();
    let alice = u.anmelden("alice");
    let bob = u.anmelden("bob");

    u.senden(alice, Frame::nachricht("bob", "alice", "gefaelscht"));

    assert_eq!(u.netz.ausgang(alice), vec![fehler("bad request")]);
    assert!(u.netz.ausgang(bob).is_empty());
    assert_eq!(u.store.message_counts("bob").unwrap().gesendet, 0);
}

#[test]
fn fehlgeschlagene_weiterleitung_trennt_empfaenger() {
    let mut u = umgebung();
    let alice = u.anmelden("alice");
    let bob = u.anmelden("bob");
    u.netz.senden_scheitert(bob);

    u.senden(alice, Frame::nachricht("alice", "bob", "hallo?"));

    assert_eq!(u.netz.ausgang(alice), vec![fehler("user not registered")]);
    assert!(u.netz.ist_geschlossen(bob));
    assert!(!u.netz.ist_geschlossen(alice));
    assert_eq!(u.handle.online_users(), vec!["alice"]);
}

// ---------------------------------------------------------------------------
// Exit und Abbau
// ---------------------------------------------------------------------------

#[test]
fn exit_gibt_namen_frei() {
    let mut u = umgebung();
    let erste = u.anmelden("alice");
    u.senden(erste, Frame::exit("alice"));

    assert!(u.netz.ausgang(erste).is_empty());
    assert!(u.netz.ist_geschlossen(erste));
    assert!(u.handle.online_users().is_empty());
    assert!(u.store.active_users().unwrap().is_empty());

    // Name kann erneut angemeldet werden
    u.anmelden("alice");
    assert_eq!(u.handle.online_users(), vec!["alice"]);
}

#[test]
fn doppeltes_exit_hat_keine_weitere_wirkung() {
    let mut u = umgebung();
    let bob = u.anmelden("bob");
    let alice = u.anmelden("alice");

    u.netz.einspeisen(alice, &Frame::exit("alice"));
    u.netz.einspeisen(alice, &Frame::exit("alice"));
    u.tick();

    assert!(u.netz.ausgang(alice).is_empty());
    assert!(u.netz.ist_geschlossen(alice));
    assert_eq!(u.handle.online_users(), vec!["bob"]);
    assert!(!u.netz.ist_geschlossen(bob));
    assert_eq!(u.schleife.verbindungen_anzahl(), 1);
}

#[test]
fn exit_fuer_fremden_namen_ist_bad_request() {
    let mut u = umgebung();
    let alice = u.anmelden("alice");
    u.senden(alice, Frame::exit("bob"));

    assert_eq!(u.netz.ausgang(alice), vec![fehler("bad request")]);
    assert!(!u.netz.ist_geschlossen(alice));
}

#[test]
fn auflegen_raeumt_sitzung_ab() {
    let mut u = umgebung();
    let alice = u.anmelden("alice");
    u.netz.auflegen(alice);
    u.tick();

    assert!(u.netz.ist_geschlossen(alice));
    assert!(u.handle.online_users().is_empty());
    assert_eq!(u.handle.connection_count(), 0);
}

#[test]
fn transportfehler_raeumt_sitzung_ab() {
    let mut u = umgebung();
    let alice = u.anmelden("alice");
    u.netz.fehler_melden(alice);
    u.tick();

    assert!(u.netz.ist_geschlossen(alice));
    assert!(u.handle.online_users().is_empty());
}

#[test]
fn untaetige_verbindung_wird_getrennt() {
    let mut u = umgebung_mit(SignalingConfig {
        idle_timeout: Some(Duration::from_millis(5)),
        ..SignalingConfig::default()
    });
    let id = u.verbinden();
    std::thread::sleep(Duration::from_millis(30));
    u.tick();

    assert!(u.netz.ist_geschlossen(id));
}

// ---------------------------------------------------------------------------
// Kontakte, Benutzer, Schluessel
// ---------------------------------------------------------------------------

#[test]
fn kontakte_verwalten() {
    let mut u = umgebung();
    let alice = u.anmelden("alice");

    u.senden(
        alice,
        Frame::Aktion(Aktion::AddContact {
            time: None,
            user: "alice".into(),
            account_name: "bob".into(),
        }),
    );
    assert_eq!(u.netz.ausgang(alice), vec![Frame::from(Antwort::ok())]);

    u.senden(
        alice,
        Frame::Aktion(Aktion::GetContacts {
            time: None,
            user: "alice".into(),
        }),
    );
    assert_eq!(
        u.netz.ausgang(alice),
        vec![Frame::from(Antwort::liste(vec!["bob".into()]))]
    );

    u.senden(
        alice,
        Frame::Aktion(Aktion::RemoveContact {
            time: None,
            user: "alice".into(),
            account_name: "bob".into(),
        }),
    );
    assert_eq!(u.netz.ausgang(alice), vec![Frame::from(Antwort::ok())]);
    assert!(u.store.get_contacts("alice").unwrap().is_empty());
}

#[test]
fn benutzerliste_enthaelt_alle_bekannten() {
    let mut u = umgebung();
    let alice = u.anmelden("alice");
    u.senden(
        alice,
        Frame::Aktion(Aktion::UsersRequest {
            time: None,
            account_name: "alice".into(),
        }),
    );

    assert_eq!(
        u.netz.ausgang(alice),
        vec![Frame::from(Antwort::liste(vec![
            "alice".into(),
            "bob".into(),
            "carol".into()
        ]))]
    );
}

#[test]
fn oeffentlicher_schluessel_abfragen() {
    let mut u = umgebung();
    u.anmelden_mit_schluessel("alice", Some("ALICE-KEY"));
    let bob = u.anmelden("bob");

    u.senden(
        bob,
        Frame::Aktion(Aktion::PublicKeyRequest {
            time: None,
            account_name: "alice".into(),
        }),
    );
    assert_eq!(
        u.netz.ausgang(bob),
        vec![Frame::from(Antwort::authentifizierung("ALICE-KEY"))]
    );

    u.senden(
        bob,
        Frame::Aktion(Aktion::PublicKeyRequest {
            time: None,
            account_name: "carol".into(),
        }),
    );
    assert_eq!(u.netz.ausgang(bob), vec![fehler("public key missing")]);
}

#[test]
fn listen_aenderung_erreicht_alle_sitzungen() {
    let mut u = umgebung();
    let alice = u.anmelden("alice");
    let bob = u.anmelden("bob");

    u.handle.notify_lists_changed();
    u.tick();

    for id in [alice, bob] {
        assert_eq!(
            u.netz.ausgang(id),
            vec![Frame::from(Antwort::listen_geaendert())]
        );
    }
}
