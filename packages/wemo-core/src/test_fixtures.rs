//! Shared test fixtures for device descriptions, SOAP and GENA payloads.
//!
//! These constants are used by multiple test modules to avoid duplication.

use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Device description of a plain WeMo switch with a single `basicevent` service.
pub const SETUP_XML: &str = r#"<?xml version="1.0"?>
<root xmlns="urn:Belkin:device-1-0">
  <specVersion>
    <major>1</major>
    <minor>0</minor>
  </specVersion>
  <device>
    <deviceType>urn:Belkin:device:controllee:1</deviceType>
    <friendlyName>Desk Lamp</friendlyName>
    <manufacturer>Belkin International Inc.</manufacturer>
    <manufacturerURL>http://www.belkin.com</manufacturerURL>
    <modelDescription>Belkin Plugin Socket 1.0</modelDescription>
    <modelName>Socket</modelName>
    <modelNumber>1.0</modelNumber>
    <serialNumber>221234K1</serialNumber>
    <UDN>uuid:Socket-1_0-221234K1</UDN>
    <firmwareVersion>WeMo_WW_2.00.11057.PVT-OWRT-SNS</firmwareVersion>
    <macAddress>94103E000000</macAddress>
    <serviceList>
      <service>
        <serviceType>urn:Belkin:service:basicevent:1</serviceType>
        <serviceId>urn:Belkin:serviceId:basicevent1</serviceId>
        <controlURL>/upnp/control/basicevent1</controlURL>
        <eventSubURL>/upnp/event/basicevent1</eventSubURL>
        <SCPDURL>/eventservice.xml</SCPDURL>
      </service>
    </serviceList>
  </device>
</root>"#;

/// Device description without any `basicevent` service.
pub const SETUP_XML_NO_BASICEVENT: &str = r#"<?xml version="1.0"?>
<root xmlns="urn:Belkin:device-1-0">
  <device>
    <friendlyName>Hallway Bridge</friendlyName>
    <modelName>Bridge</modelName>
    <serialNumber>231423B0100AAA</serialNumber>
    <UDN>uuid:Bridge-1_0-231423B0100AAA</UDN>
    <serviceList>
      <service>
        <serviceType>urn:Belkin:service:bridge:1</serviceType>
        <controlURL>/upnp/control/bridge1</controlURL>
        <eventSubURL>/upnp/event/bridge1</eventSubURL>
        <SCPDURL>/bridgeservice.xml</SCPDURL>
      </service>
    </serviceList>
  </device>
</root>"#;

/// SCPD for the `basicevent` service.
pub const EVENTSERVICE_XML: &str = r#"<?xml version="1.0"?>
<scpd xmlns="urn:Belkin:service-1-0">
  <specVersion>
    <major>1</major>
    <minor>0</minor>
  </specVersion>
  <actionList>
    <action>
      <name>SetBinaryState</name>
      <argumentList>
        <argument>
          <retval/>
          <name>BinaryState</name>
          <relatedStateVariable>BinaryState</relatedStateVariable>
          <direction>in</direction>
        </argument>
      </argumentList>
    </action>
    <action>
      <name>GetBinaryState</name>
      <argumentList>
        <argument>
          <retval/>
          <name>BinaryState</name>
          <relatedStateVariable>BinaryState</relatedStateVariable>
          <direction>out</direction>
        </argument>
      </argumentList>
    </action>
    <action>
      <name>GetFriendlyName</name>
    </action>
  </actionList>
  <serviceStateTable>
    <stateVariable sendEvents="yes">
      <name>BinaryState</name>
      <dataType>Boolean</dataType>
      <defaultValue>0</defaultValue>
    </stateVariable>
  </serviceStateTable>
</scpd>"#;

/// SCPD for the bridge service.
pub const BRIDGESERVICE_XML: &str = r#"<?xml version="1.0"?>
<scpd xmlns="urn:Belkin:service-1-0">
  <actionList>
    <action>
      <name>GetEndDevices</name>
      <argumentList>
        <argument><name>DevUDN</name><direction>in</direction></argument>
        <argument><name>ReqListType</name><direction>in</direction></argument>
        <argument><name>DeviceLists</name><direction>out</direction></argument>
      </argumentList>
    </action>
  </actionList>
</scpd>"#;

/// `GetBinaryState` response reporting "on".
pub const GET_BINARY_STATE_ON: &str = r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/"><s:Body>
<u:GetBinaryStateResponse xmlns:u="urn:Belkin:service:basicevent:1">
<BinaryState>1</BinaryState>
</u:GetBinaryStateResponse>
</s:Body> </s:Envelope>"#;

/// `GetBinaryState` response reporting "off".
pub const GET_BINARY_STATE_OFF: &str = r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/"><s:Body>
<u:GetBinaryStateResponse xmlns:u="urn:Belkin:service:basicevent:1">
<BinaryState>0</BinaryState>
</u:GetBinaryStateResponse>
</s:Body> </s:Envelope>"#;

/// `SetBinaryState` response echoing the new state.
pub const SET_BINARY_STATE_ON: &str = r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/"><s:Body>
<u:SetBinaryStateResponse xmlns:u="urn:Belkin:service:basicevent:1">
<BinaryState>1</BinaryState>
</u:SetBinaryStateResponse>
</s:Body> </s:Envelope>"#;

/// UPnP SOAP fault.
pub const SOAP_FAULT: &str = r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/"><s:Body>
<s:Fault>
<faultcode>s:Client</faultcode>
<faultstring>UPnPError</faultstring>
<detail><UPnPError xmlns="urn:schemas-upnp-org:control-1-0"><errorCode>-1</errorCode><errorDescription>Invalid Action</errorDescription></UPnPError></detail>
</s:Fault>
</s:Body></s:Envelope>"#;

/// NOTIFY body carrying a single `BinaryState` change.
pub const NOTIFY_BINARY_STATE_ON: &str = r#"<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0">
<e:property>
<BinaryState>1</BinaryState>
</e:property>
</e:propertyset>"#;

/// NOTIFY body with two properties, as sent by Insight plugs.
pub const NOTIFY_INSIGHT: &str = r#"<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0">
<e:property>
<BinaryState>8|1520000000|0|1234|56789|1209600|19|520|360000|9000000|8000</BinaryState>
</e:property>
<e:property>
<InsightParams>8|1520000000|0|1234|56789|1209600|19|520|360000|9000000|8000</InsightParams>
</e:property>
</e:propertyset>"#;

/// Mounts a switch serving [`SETUP_XML`], [`EVENTSERVICE_XML`] and an "off"
/// `GetBinaryState` answer.
pub async fn mount_switch(server: &MockServer) {
    mount_switch_schema(server).await;
    Mock::given(method("POST"))
        .and(path("/upnp/control/basicevent1"))
        .and(body_string_contains("GetBinaryState"))
        .respond_with(ResponseTemplate::new(200).set_body_string(GET_BINARY_STATE_OFF))
        .mount(server)
        .await;
}

/// Mounts only the description documents of a switch.
pub async fn mount_switch_schema(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/setup.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SETUP_XML))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/eventservice.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(EVENTSERVICE_XML))
        .mount(server)
        .await;
}
